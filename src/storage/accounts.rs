use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{Account, IdentifierStrategy};
use super::tables::*;

impl Database {
    /// Get an account by owner id
    pub fn get_account(&self, owner_id: &str) -> Result<Option<Account>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;

        match table.get(owner_id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Return the owner's account, creating it with default settings on first use
    pub fn get_or_create_account(&self, owner_id: &str) -> Result<Account, DatabaseError> {
        debug_assert!(!owner_id.is_empty(), "owner id must not be empty");

        let write_txn = self.begin_write()?;
        let account = {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            let existing: Option<Account> = match table.get(owner_id)? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };

            match existing {
                Some(account) => account,
                None => {
                    let account = Account {
                        owner_id: owner_id.to_string(),
                        identifier_strategy: IdentifierStrategy::default(),
                        created_at: Utc::now(),
                    };
                    let data = rmp_serde::to_vec_named(&account)?;
                    table.insert(owner_id, data.as_slice())?;
                    tracing::debug!(owner = %owner_id, "Created account");
                    account
                }
            }
        };
        write_txn.commit()?;
        Ok(account)
    }

    /// Change the identifier strategy, creating the account if needed
    pub fn set_identifier_strategy(
        &self,
        owner_id: &str,
        strategy: IdentifierStrategy,
    ) -> Result<Account, DatabaseError> {
        let mut account = self.get_or_create_account(owner_id)?;
        account.identifier_strategy = strategy;

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            let data = rmp_serde::to_vec_named(&account)?;
            table.insert(owner_id, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(account)
    }
}
