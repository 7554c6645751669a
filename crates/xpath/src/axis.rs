use std::fmt;

/// Structural direction of a path step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Ancestor,
    AncestorOrSelf,
    Parent,
    SelfAxis,
    Attribute,
    /// Attributes of the context node and of all its descendants.
    DescendantAttribute,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Namespace,
}

impl Axis {
    /// Reverse axes number their positions from the context node outwards.
    pub fn is_reverse(self) -> bool {
        matches!(self, Axis::Ancestor | Axis::AncestorOrSelf | Axis::Parent | Axis::PrecedingSibling | Axis::Preceding)
    }

    /// True if the axis selects attribute nodes rather than elements and other children.
    pub fn is_attribute_axis(self) -> bool {
        matches!(self, Axis::Attribute | Axis::DescendantAttribute)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Parent => "parent",
            Axis::SelfAxis => "self",
            Axis::Attribute => "attribute",
            Axis::DescendantAttribute => "descendant-attribute",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Following => "following",
            Axis::Preceding => "preceding",
            Axis::Namespace => "namespace",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
