#![forbid(unsafe_code)]

//! Transition classification.
//!
//! [`classify`] is a pure function of the mutation summary produced by the
//! stack model. It carries no state between calls.
//!
//! | size change | condition                                   | result                  |
//! |-------------|---------------------------------------------|-------------------------|
//! | any         | started empty, or kind is `Replace`         | `Replace`               |
//! | grows       | pushed tag is `Child`                       | `Sibling`               |
//! | grows       | new top sits on a presented boundary        | `PresentStack`          |
//! | grows       | otherwise                                   | `BeginStack`            |
//! | shrinks     | kind is not `Pop`                           | `Replace`               |
//! | shrinks     | last removed tag is `Child`                 | `Back`                  |
//! | shrinks     | unwound exactly to a presented boundary     | `ClosePresentedStack`   |
//! | shrinks     | otherwise                                   | `CloseStack`            |
//! | same        |                                             | `Replace`               |

use std::fmt;

/// Position of a record within the stack-of-stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// First record of the first segment.
    Root,
    /// First record of any later segment.
    Stack,
    /// Ordinary member of a segment.
    Child,
}

/// Kind of stack mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationKind {
    Push,
    Replace,
    Pop,
}

/// Classification of a mutation, used to pick an animation treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    BeginStack,
    PresentStack,
    Sibling,
    Replace,
    CloseStack,
    ClosePresentedStack,
    Back,
}

/// Coarse animation direction for a [`Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Crossfade,
}

impl Transition {
    /// Direction the renderer should animate in.
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            Self::BeginStack | Self::PresentStack | Self::Sibling => Direction::Forward,
            Self::CloseStack | Self::ClosePresentedStack | Self::Back => Direction::Backward,
            Self::Replace => Direction::Crossfade,
        }
    }

    /// Stable lowercase name, used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeginStack => "begin_stack",
            Self::PresentStack => "present_stack",
            Self::Sibling => "sibling",
            Self::Replace => "replace",
            Self::CloseStack => "close_stack",
            Self::ClosePresentedStack => "close_presented_stack",
            Self::Back => "back",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionInput {
    pub kind: NavigationKind,
    pub starting_len: usize,
    pub ending_len: usize,
    /// Tag of the record pushed by the mutation, if any.
    pub pushed_tag: Option<Tag>,
    /// Tag of the last record popped by the mutation, if any.
    pub last_removed_tag: Option<Tag>,
    /// Index of the innermost pending presented boundary after the mutation.
    pub presented_top: Option<usize>,
    /// Index of the presented boundary resolved by the mutation, if any.
    pub unwound_presented: Option<usize>,
}

/// Classify a mutation.
#[must_use]
pub fn classify(input: &TransitionInput) -> Transition {
    if input.starting_len == 0 || input.kind == NavigationKind::Replace {
        return Transition::Replace;
    }
    if input.ending_len > input.starting_len {
        if input.pushed_tag == Some(Tag::Child) {
            Transition::Sibling
        } else if input.presented_top == Some(input.ending_len - 1) {
            Transition::PresentStack
        } else {
            Transition::BeginStack
        }
    } else if input.ending_len < input.starting_len {
        if input.kind != NavigationKind::Pop {
            Transition::Replace
        } else if input.last_removed_tag == Some(Tag::Child) {
            Transition::Back
        } else if input.unwound_presented == Some(input.ending_len) {
            Transition::ClosePresentedStack
        } else {
            Transition::CloseStack
        }
    } else {
        Transition::Replace
    }
}
