//! Cache tags and invalidation matching.

use std::fmt;

/// Entity kind a tag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Product,
    Category,
    Order,
    Address,
    PaymentMethod,
    Profile,
    User,
    Message,
    Stats,
}

impl TagKind {
    /// Whether data under this kind belongs to the signed-in user (or to the
    /// admin back-office) and must not survive a logout.
    #[must_use]
    pub const fn is_user_scoped(self) -> bool {
        !matches!(self, Self::Product | Self::Category)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "Product",
            Self::Category => "Category",
            Self::Order => "Order",
            Self::Address => "Address",
            Self::PaymentMethod => "PaymentMethod",
            Self::Profile => "Profile",
            Self::User => "User",
            Self::Message => "Message",
            Self::Stats => "Stats",
        }
    }
}

/// A label on a cached result: a bare kind (`Order`) or a kind plus id
/// (`Order:42`).
///
/// Invalidating a bare tag hits every entry tagged with that kind, with or
/// without an id. Invalidating `Order:42` hits only entries tagged `Order:42`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub id: Option<String>,
}

impl Tag {
    /// A bare tag covering every entity of `kind`.
    #[must_use]
    pub const fn kind(kind: TagKind) -> Self {
        Self { kind, id: None }
    }

    /// A tag for one entity.
    #[must_use]
    pub fn id(kind: TagKind, id: impl fmt::Display) -> Self {
        Self {
            kind,
            id: Some(id.to_string()),
        }
    }

    /// Whether invalidating `self` affects an entry that provides `provided`.
    #[must_use]
    pub fn matches(&self, provided: &Self) -> bool {
        if self.kind != provided.kind {
            return false;
        }
        match (&self.id, &provided.id) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        }
    }

    #[must_use]
    pub const fn is_user_scoped(&self) -> bool {
        self.kind.is_user_scoped()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{id}", self.kind.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// Whether any invalidated tag matches any provided tag.
#[must_use]
pub fn intersects(invalidated: &[Tag], provided: &[Tag]) -> bool {
    invalidated
        .iter()
        .any(|inv| provided.iter().any(|p| inv.matches(p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_tag_matches_every_id() {
        let bare = Tag::kind(TagKind::Order);
        assert!(bare.matches(&Tag::id(TagKind::Order, 7)));
        assert!(bare.matches(&Tag::kind(TagKind::Order)));
        assert!(!bare.matches(&Tag::kind(TagKind::Product)));
    }

    #[test]
    fn test_id_tag_matches_only_that_id() {
        let one = Tag::id(TagKind::Order, 7);
        assert!(one.matches(&Tag::id(TagKind::Order, 7)));
        assert!(!one.matches(&Tag::id(TagKind::Order, 8)));
        assert!(!one.matches(&Tag::kind(TagKind::Order)));
    }

    #[test]
    fn test_user_scoped_kinds() {
        assert!(TagKind::Address.is_user_scoped());
        assert!(TagKind::Order.is_user_scoped());
        assert!(!TagKind::Product.is_user_scoped());
        assert!(!TagKind::Category.is_user_scoped());
    }

    #[test]
    fn test_display() {
        assert_eq!(Tag::id(TagKind::PaymentMethod, 3).to_string(), "PaymentMethod:3");
        assert_eq!(Tag::kind(TagKind::Order).to_string(), "Order");
    }

    #[test]
    fn test_intersects() {
        let provided = [Tag::kind(TagKind::Order), Tag::id(TagKind::Order, 1)];
        assert!(intersects(&[Tag::id(TagKind::Order, 1)], &provided));
        assert!(!intersects(&[Tag::id(TagKind::Order, 2)], &provided));
        assert!(!intersects(&[Tag::kind(TagKind::Address)], &provided));
        assert!(!intersects(&[], &provided));
    }
}
