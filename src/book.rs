//! Catalog records and the permission-guarded handlers over them.
//!
//! Every operation asks the [`Gate`] first and fails with
//! [`Error::Denied`] before the store is touched.

use crate::error::{Error, Result};
use crate::gate::Gate;
use crate::permission::ActionKind;
use crate::store::{BookStore, Store};
use crate::types::{PrincipalId, ResourceType};
use std::fmt;

const MAX_TITLE_LEN: usize = 200;
const MAX_AUTHOR_LEN: usize = 100;

/// Resource type name guarding [`Book`] records.
pub const BOOK_RESOURCE: &str = "book";

/// Catalog record identifier.
pub type BookId = u64;

/// Catalog record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub publication_year: i32,
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {} ({})", self.title, self.author, self.publication_year)
    }
}

/// Field values for creating or editing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub publication_year: i32,
}

impl NewBook {
    /// Trims and validates the fields.
    pub fn validated(self) -> Result<Self> {
        let title = required_field(&self.title, "title", MAX_TITLE_LEN)?;
        let author = required_field(&self.author, "author", MAX_AUTHOR_LEN)?;
        Ok(Self {
            title,
            author,
            publication_year: self.publication_year,
        })
    }
}

fn required_field(value: &str, field: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRecord(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::InvalidRecord(format!(
            "{field} length must be <= {max_len}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Proof that the caller went through an explicit confirmation step.
///
/// Only obtainable from a non-safe request method, never from a plain
/// retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteConfirmation(());

impl DeleteConfirmation {
    /// Returns a confirmation for `POST`, `DELETE` and other non-safe methods.
    pub fn from_method(method: &str) -> Option<Self> {
        if is_safe_method(method) {
            None
        } else {
            Some(Self(()))
        }
    }
}

/// `GET`, `HEAD`, `OPTIONS` and `TRACE` never change state.
pub(crate) fn is_safe_method(method: &str) -> bool {
    ["GET", "HEAD", "OPTIONS", "TRACE"]
        .iter()
        .any(|safe| method.trim().eq_ignore_ascii_case(safe))
}

/// Permission-guarded handlers for [`Book`] records.
#[derive(Debug)]
pub struct Books<'g, S, B> {
    gate: &'g Gate<S>,
    books: B,
    resource: ResourceType,
}

impl<'g, S, B> Books<'g, S, B>
where
    S: Store,
    B: BookStore + Send + Sync,
{
    pub fn new(gate: &'g Gate<S>, books: B) -> Self {
        Self {
            gate,
            books,
            resource: ResourceType::from_string(BOOK_RESOURCE.to_string()),
        }
    }

    /// Lists every record. Requires `book:view`.
    pub async fn list(&self, principal: Option<&PrincipalId>) -> Result<Vec<Book>> {
        self.require(principal, ActionKind::View).await?;
        self.books.books().await.map_err(Error::from)
    }

    /// Returns one record. Requires `book:view`.
    pub async fn get(&self, principal: Option<&PrincipalId>, id: BookId) -> Result<Book> {
        self.require(principal, ActionKind::View).await?;
        self.books
            .book(id)
            .await
            .map_err(Error::from)?
            .ok_or(Error::BookNotFound(id))
    }

    /// Creates a record. Requires `book:create`.
    pub async fn create(&self, principal: Option<&PrincipalId>, book: NewBook) -> Result<Book> {
        self.require(principal, ActionKind::Create).await?;
        let book = book.validated()?;
        let created = self.books.insert_book(book).await.map_err(Error::from)?;
        tracing::info!(book = created.id, principal = ?principal, "book created");
        Ok(created)
    }

    /// Replaces a record's fields. Requires `book:edit`.
    pub async fn edit(
        &self,
        principal: Option<&PrincipalId>,
        id: BookId,
        book: NewBook,
    ) -> Result<Book> {
        self.require(principal, ActionKind::Edit).await?;
        let book = book.validated()?;
        let updated = self
            .books
            .update_book(id, book)
            .await
            .map_err(Error::from)?
            .ok_or(Error::BookNotFound(id))?;
        tracing::info!(book = id, principal = ?principal, "book edited");
        Ok(updated)
    }

    /// Deletes a record after explicit confirmation. Requires `book:delete`.
    pub async fn delete(
        &self,
        principal: Option<&PrincipalId>,
        id: BookId,
        _confirmation: DeleteConfirmation,
    ) -> Result<()> {
        self.require(principal, ActionKind::Delete).await?;
        if !self.books.delete_book(id).await.map_err(Error::from)? {
            return Err(Error::BookNotFound(id));
        }
        tracing::info!(book = id, principal = ?principal, "book deleted");
        Ok(())
    }

    async fn require(&self, principal: Option<&PrincipalId>, action: ActionKind) -> Result<()> {
        self.gate
            .authorize(principal, &self.resource, action)
            .await?
            .require()
    }
}
