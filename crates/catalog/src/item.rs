use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toolroom_core::{DomainError, DomainResult, ItemId, TenantId};

/// A tenant-scoped pool unit: the stock of one item not currently allocated
/// to any project.
///
/// Invariants:
/// - `quantity >= 0` at all times
/// - `name` is non-empty and unique per tenant, case-insensitively (the
///   uniqueness check itself is a store concern; [`Item::name_key`] provides
///   the comparison key)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub item_id: ItemId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    /// Pool quantity available for allocation.
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial direct edit of an item (admin action).
///
/// Pool quantity edits bypass the ledger on purpose: they model stock
/// corrections and acquisitions, not movements between pool and projects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
}

impl Item {
    pub fn new(
        tenant_id: TenantId,
        item_id: ItemId,
        name: &str,
        description: Option<String>,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let name = normalize_name(name)?;
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(Self {
            item_id,
            tenant_id,
            name,
            description,
            quantity,
            created_at: now,
            updated_at: now,
        })
    }

    /// Case-insensitive key used for per-tenant name uniqueness.
    pub fn name_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Apply a direct edit, revalidating the touched fields.
    pub fn apply_edit(&mut self, edit: ItemEdit, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = edit.name {
            self.name = normalize_name(&name)?;
        }
        if let Some(description) = edit.description {
            self.description = Some(description);
        }
        if let Some(quantity) = edit.quantity {
            if quantity < 0 {
                return Err(DomainError::validation("quantity cannot be negative"));
            }
            self.quantity = quantity;
        }
        self.updated_at = now;
        Ok(())
    }
}

fn normalize_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(quantity: i64) -> Item {
        Item::new(
            TenantId::new(),
            ItemId::new(),
            "Impact Driver",
            None,
            quantity,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_blank_names() {
        let err = Item::new(TenantId::new(), ItemId::new(), "   ", None, 1, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_negative_pool_quantity() {
        let err =
            Item::new(TenantId::new(), ItemId::new(), "Drill", None, -1, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn name_key_is_case_insensitive() {
        let a = item(3);
        let mut b = a.clone();
        b.name = "IMPACT driver".to_string();
        assert_eq!(a.name_key(), b.name_key());
    }

    #[test]
    fn edit_revalidates_quantity() {
        let mut it = item(3);
        let err = it
            .apply_edit(
                ItemEdit {
                    quantity: Some(-2),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(it.quantity, 3);
    }

    proptest! {
        #[test]
        fn names_are_stored_trimmed(pad_left in " {0,4}", pad_right in " {0,4}") {
            let name = format!("{pad_left}Socket Set{pad_right}");
            let it = Item::new(TenantId::new(), ItemId::new(), &name, None, 0, Utc::now()).unwrap();
            prop_assert_eq!(it.name.as_str(), "Socket Set");
        }
    }
}
