use super::Backoffice;
use crate::error::{CoreError, Result};
use crate::storage::{Contact, ContactFilter, ContactStore, PoolStore};
use crate::types::{Page, PageRequest};
use crate::validation::Validator;
use chrono::Utc;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContact {
    pub betting_pool_id: i64,
    pub contact_name: String,
    pub phone: Option<String>,
    pub telegram_chat_id: Option<String>,
}

/// A blank name keeps the current one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContact {
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub telegram_chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactQuery {
    pub betting_pool_id: Option<i64>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validate_channels(v: &mut Validator, phone: Option<&str>, telegram: Option<&str>) {
    v.optional_max_len(phone, "phone", 20)
        .optional_max_len(telegram, "telegramChatId", 50);
}

impl Backoffice {
    pub async fn list_contacts(&self, query: ContactQuery) -> Result<Page<Contact>> {
        let paging = PageRequest::from_parts(query.page, query.page_size);
        paging.validate()?;

        let filter = ContactFilter {
            betting_pool_id: query.betting_pool_id,
            search: query.search,
        };
        let conn = self.storage.get_connection().await;
        let (contacts, total) = ContactStore::new(&conn).list(&filter, paging)?;
        Ok(Page::new(contacts, paging, total))
    }

    pub async fn create_contact(&self, request: CreateContact) -> Result<Contact> {
        let mut v = Validator::new();
        v.required(&request.contact_name, "contactName")
            .max_len(&request.contact_name, "contactName", 100);
        validate_channels(&mut v, request.phone.as_deref(), request.telegram_chat_id.as_deref());
        v.finish()?;

        let conn = self.storage.get_connection().await;
        if PoolStore::new(&conn).get(request.betting_pool_id)?.is_none() {
            return Err(CoreError::invalid("bettingPoolId", "betting pool does not exist"));
        }

        let now = Utc::now();
        let mut contact = Contact {
            id: 0,
            betting_pool_id: request.betting_pool_id,
            contact_name: request.contact_name.trim().to_string(),
            phone: trimmed(request.phone),
            telegram_chat_id: trimmed(request.telegram_chat_id),
            created_at: now,
            updated_at: now,
        };
        contact.id = ContactStore::new(&conn).insert(&contact)?;

        tracing::info!(
            "Created contact {} for betting pool {}",
            contact.id,
            contact.betting_pool_id
        );
        Ok(contact)
    }

    pub async fn update_contact(&self, id: i64, request: UpdateContact) -> Result<Contact> {
        let mut v = Validator::new();
        v.optional_max_len(request.contact_name.as_deref(), "contactName", 100);
        validate_channels(&mut v, request.phone.as_deref(), request.telegram_chat_id.as_deref());
        v.finish()?;

        let conn = self.storage.get_connection().await;
        let store = ContactStore::new(&conn);
        let mut contact = store.get(id)?.ok_or_else(|| CoreError::not_found("Contact", id))?;

        if let Some(name) = trimmed(request.contact_name) {
            contact.contact_name = name;
        }
        if request.phone.is_some() {
            contact.phone = trimmed(request.phone);
        }
        if request.telegram_chat_id.is_some() {
            contact.telegram_chat_id = trimmed(request.telegram_chat_id);
        }
        contact.updated_at = Utc::now();
        store.update(&contact)?;
        Ok(contact)
    }

    pub async fn delete_contact(&self, id: i64) -> Result<()> {
        let conn = self.storage.get_connection().await;
        if !ContactStore::new(&conn).delete(id)? {
            return Err(CoreError::not_found("Contact", id));
        }
        tracing::info!("Deleted contact {}", id);
        Ok(())
    }

    pub async fn delete_pool_contacts(&self, pool_id: i64) -> Result<usize> {
        let conn = self.storage.get_connection().await;
        let removed = ContactStore::new(&conn).delete_for_pool(pool_id)?;
        tracing::info!("Deleted {} contacts of betting pool {}", removed, pool_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoffice::{testing, CreatePool, CreateZone};

    async fn pool(office: &Backoffice) -> i64 {
        let zone = office
            .create_zone(CreateZone {
                name: "Capital".to_string(),
            })
            .await
            .unwrap();
        office
            .create_pool(CreatePool {
                code: None,
                name: "Banca".to_string(),
                zone_id: zone.id,
                address: None,
                phone: None,
                config: None,
            })
            .await
            .unwrap()
            .id
    }

    fn create(pool_id: i64, name: &str) -> CreateContact {
        CreateContact {
            betting_pool_id: pool_id,
            contact_name: name.to_string(),
            phone: Some(" 809-555-0101 ".to_string()),
            telegram_chat_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_validates_pool_and_fields() {
        let office = testing::backoffice().await;
        let pool_id = pool(&office).await;

        match office.create_contact(create(pool_id + 9, "Pedro")).await {
            Err(CoreError::Validation(errors)) => assert_eq!(errors[0].field, "bettingPoolId"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            office.create_contact(create(pool_id, "   ")).await,
            Err(CoreError::Validation(_))
        ));

        let contact = office.create_contact(create(pool_id, " Pedro ")).await.unwrap();
        assert_eq!(contact.contact_name, "Pedro");
        assert_eq!(contact.phone.as_deref(), Some("809-555-0101"));
    }

    #[tokio::test]
    async fn test_update_keeps_name_when_blank() {
        let office = testing::backoffice().await;
        let pool_id = pool(&office).await;
        let contact = office.create_contact(create(pool_id, "Pedro")).await.unwrap();

        let updated = office
            .update_contact(
                contact.id,
                UpdateContact {
                    contact_name: Some("  ".to_string()),
                    phone: Some(String::new()),
                    telegram_chat_id: Some("12345".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.contact_name, "Pedro");
        assert_eq!(updated.phone, None);
        assert_eq!(updated.telegram_chat_id.as_deref(), Some("12345"));

        office.create_contact(create(pool_id, "Ana")).await.unwrap();
        let page = office
            .list_contacts(ContactQuery {
                betting_pool_id: Some(pool_id),
                ..ContactQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.items[0].contact_name, "Ana");

        assert_eq!(office.delete_pool_contacts(pool_id).await.unwrap(), 2);
        assert!(matches!(
            office.delete_contact(contact.id).await,
            Err(CoreError::NotFound { .. })
        ));
    }
}
