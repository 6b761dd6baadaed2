//! # Text values and text lists
//!
//! Header lines, URIs and tokens travel through the crate as [`Text`] values.
//! A `Text` remembers how it came to hold its characters:
//!
//! - [`Ownership::Copied`]: the caller's string was copied into a fresh buffer
//! - [`Ownership::Adopted`]: the caller handed over an owned `String`
//! - [`Ownership::Borrowed`]: the caller's string is referenced, never freed
//!
//! The tag is fixed at construction and only ever read back; it is never
//! re-derived from how the value is used later.
//!
//! [`TextList`] is an ordered, growable collection of `Text` values that keeps
//! a running sum of their byte lengths, so joining a list is a single
//! allocation of exactly the right size.
//!
//! ```rust
//! use libiot_ingest::text::{Text, TextList};
//!
//! let mut list = TextList::new();
//! list.add(Text::borrowed("Accept: ")).unwrap();
//! list.add(Text::copied("multipart/mixed").unwrap()).unwrap();
//!
//! assert_eq!(list.total_len(), 23);
//! assert_eq!(list.concat().unwrap(), "Accept: multipart/mixed");
//! ```

#![deny(unsafe_code)]

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::Error;

/// Default number of slots a [`TextList`] grows by when full.
pub const DEFAULT_INCREMENT: usize = 8;

/// How a [`Text`] holds its characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Copied from a caller's string; freed on drop.
    Copied,
    /// Taken over from a caller's `String`; freed on drop.
    Adopted,
    /// Referenced from the caller; never freed by this value.
    Borrowed,
}

/// A character buffer tagged with the way it was obtained.
#[derive(Clone, PartialEq, Eq)]
pub struct Text<'a> {
    value: Cow<'a, str>,
    ownership: Ownership,
}

impl Text<'static> {
    /// Copies `value` into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfMemory`] if the buffer cannot be allocated.
    pub fn copied(value: &str) -> Result<Self, Error> {
        let mut owned = String::new();
        owned.try_reserve_exact(value.len())?;
        owned.push_str(value);
        Ok(Self {
            value: Cow::Owned(owned),
            ownership: Ownership::Copied,
        })
    }

    /// Takes ownership of an existing `String` without copying it.
    pub fn adopted(value: String) -> Self {
        Self {
            value: Cow::Owned(value),
            ownership: Ownership::Adopted,
        }
    }
}

impl<'a> Text<'a> {
    /// References `value` for as long as the `Text` lives.
    pub fn borrowed(value: &'a str) -> Self {
        Self {
            value: Cow::Borrowed(value),
            ownership: Ownership::Borrowed,
        }
    }

    /// The characters held by this value.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns `true` if the value holds no characters.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// The ownership mode chosen at construction.
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// Returns `true` if dropping this value frees its buffer.
    pub fn owns_buffer(&self) -> bool {
        self.ownership != Ownership::Borrowed
    }

    /// Converts into an owned `String`, copying only if borrowed.
    pub fn into_string(self) -> String {
        self.value.into_owned()
    }
}

impl fmt::Debug for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Text")
            .field("value", &self.value.as_ref())
            .field("ownership", &self.ownership)
            .finish()
    }
}

impl fmt::Display for Text<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for Text<'_> {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// An ordered list of [`Text`] values with a running byte total.
///
/// Each element keeps its own [`Ownership`], so one list may mix borrowed
/// literals with copied or adopted values. Dropping the list drops every
/// element; [`TextList::into_values`] hands them back instead.
#[derive(Debug, Clone)]
pub struct TextList<'a> {
    items: Vec<Text<'a>>,
    increment: usize,
    total_len: usize,
}

impl<'a> TextList<'a> {
    /// Creates an empty list that grows by [`DEFAULT_INCREMENT`] slots.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            increment: DEFAULT_INCREMENT,
            total_len: 0,
        }
    }

    /// Creates a list with `initial` slots that grows by `increment`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `increment` is zero,
    /// [`Error::OutOfMemory`] if the initial slots cannot be allocated.
    pub fn with_capacity(initial: usize, increment: usize) -> Result<Self, Error> {
        if increment == 0 {
            return Err(Error::InvalidArgument);
        }
        let mut items = Vec::new();
        items.try_reserve_exact(initial)?;
        Ok(Self {
            items,
            increment,
            total_len: 0,
        })
    }

    /// Appends a value, growing by the list increment when full.
    pub fn add(&mut self, text: Text<'a>) -> Result<(), Error> {
        if self.items.len() == self.items.capacity() {
            self.items.try_reserve_exact(self.increment)?;
        }
        self.total_len += text.len();
        self.items.push(text);
        Ok(())
    }

    /// Returns the value at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Text<'a>> {
        self.items.get(index)
    }

    /// Number of values in the list.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of slots available before the next growth.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Sum of the byte lengths of all values.
    pub fn total_len(&self) -> usize {
        self.total_len
    }

    /// Iterates the values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Text<'a>> {
        self.items.iter()
    }

    /// Joins all values into one `String` with no separator.
    pub fn concat(&self) -> Result<String, Error> {
        self.join("")
    }

    /// Joins all values with `separator` between consecutive values.
    pub fn join(&self, separator: &str) -> Result<String, Error> {
        let separators = separator.len() * self.items.len().saturating_sub(1);
        let mut out = String::new();
        out.try_reserve_exact(self.total_len + separators)?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.push_str(item.as_str());
        }
        Ok(out)
    }

    /// Removes every value, dropping them.
    pub fn clear(&mut self) {
        self.items.clear();
        self.total_len = 0;
    }

    /// Consumes the list without dropping its values.
    pub fn into_values(self) -> Vec<Text<'a>> {
        self.items
    }
}

impl Default for TextList<'_> {
    fn default() -> Self {
        Self::new()
    }
}
