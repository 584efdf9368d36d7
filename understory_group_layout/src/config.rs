// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration and per-source options.

use core::num::NonZeroUsize;

use crate::LayoutError;

/// How logical items are packed into visual rows.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum LayoutShape {
    /// One item per row.
    #[default]
    Compact,
    /// Up to `stack_count` leaves of a bottom-level group share a row.
    Stacked {
        /// Leaves per row.
        stack_count: NonZeroUsize,
    },
    /// Leaves flow into a row until the next one no longer fits across the
    /// opposite axis.
    Wrap {
        /// Room available across the scroll axis.
        available_opposite_length: f64,
        /// Opposite-axis length assumed for unmeasured items.
        default_item_opposite_length: f64,
    },
}

/// Construction-time configuration for a [`LayoutEngine`](crate::LayoutEngine).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    /// Length along the scroll axis assumed for unmeasured rows.
    pub default_item_length: f64,
    /// Row packing policy.
    pub shape: LayoutShape,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_item_length: 1.0,
            shape: LayoutShape::Compact,
        }
    }
}

impl LayoutConfig {
    /// A compact layout with unit default row length.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default row length.
    #[must_use]
    pub fn with_default_item_length(mut self, length: f64) -> Self {
        self.default_item_length = length;
        self
    }

    /// Sets the row packing policy.
    #[must_use]
    pub fn with_shape(mut self, shape: LayoutShape) -> Self {
        self.shape = shape;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), LayoutError> {
        validate_length(self.default_item_length, "default item length")?;
        if let LayoutShape::Wrap {
            available_opposite_length,
            default_item_opposite_length,
        } = self.shape
        {
            validate_length(available_opposite_length, "available opposite length")?;
            validate_length(default_item_opposite_length, "default item opposite length")?;
        }
        Ok(())
    }
}

pub(crate) fn validate_length(value: f64, what: &'static str) -> Result<(), LayoutError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidConfig(what))
    }
}

/// Where group and grand totals are placed by the aggregation engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum TotalsPosition {
    /// No total rows.
    #[default]
    None,
    /// Totals precede the group's items.
    First,
    /// Totals follow the group's items.
    Last,
    /// Totals are shown inline in the group header.
    Inline,
}

/// Options for a full re-index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceOptions {
    /// Number of grouping levels. `0` means a flat list and `usize::MAX`
    /// follows the hierarchy as deep as it goes.
    pub group_levels: usize,
    /// Placement of total rows.
    pub totals_position: TotalsPosition,
    /// Deepest group level that shows aggregates.
    pub aggregates_level: usize,
    /// Number of aggregate values per total row.
    pub totals_count: usize,
    /// Show aggregates inline on collapsed headers.
    pub show_aggregate_values_inline: bool,
    /// Reapply the current collapse state to items that survive the re-index.
    pub restore_collapsed: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            group_levels: usize::MAX,
            totals_position: TotalsPosition::None,
            aggregates_level: 0,
            totals_count: 0,
            show_aggregate_values_inline: false,
            restore_collapsed: false,
        }
    }
}

impl SourceOptions {
    /// Options for a flat list.
    #[must_use]
    pub fn flat() -> Self {
        Self {
            group_levels: 0,
            ..Self::default()
        }
    }

    /// Options for a hierarchy grouped `levels` deep.
    #[must_use]
    pub fn grouped(levels: usize) -> Self {
        Self {
            group_levels: levels,
            ..Self::default()
        }
    }

    /// Sets [`restore_collapsed`](Self::restore_collapsed).
    #[must_use]
    pub fn restoring_collapsed(mut self, restore: bool) -> Self {
        self.restore_collapsed = restore;
        self
    }

    /// Clamps the aggregate settings to the grouping depth.
    pub(crate) fn normalized(mut self) -> Self {
        if self.totals_count == 0 {
            self.aggregates_level = 0;
        } else if self.group_levels != usize::MAX {
            self.aggregates_level = self
                .aggregates_level
                .min(self.group_levels.saturating_sub(1));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{LayoutConfig, LayoutShape, SourceOptions};
    use crate::LayoutError;

    #[test]
    fn rejects_bad_lengths() {
        assert!(LayoutConfig::new().validate().is_ok());
        assert_eq!(
            LayoutConfig::new()
                .with_default_item_length(f64::NAN)
                .validate(),
            Err(LayoutError::InvalidConfig("default item length"))
        );
        let wrap = LayoutConfig::new().with_shape(LayoutShape::Wrap {
            available_opposite_length: -1.0,
            default_item_opposite_length: 10.0,
        });
        assert!(wrap.validate().is_err());
    }

    #[test]
    fn aggregates_clamp_to_group_levels() {
        let options = SourceOptions {
            aggregates_level: 5,
            totals_count: 2,
            ..SourceOptions::grouped(2)
        };
        assert_eq!(options.normalized().aggregates_level, 1);

        let no_totals = SourceOptions {
            aggregates_level: 5,
            ..SourceOptions::grouped(2)
        };
        assert_eq!(no_totals.normalized().aggregates_level, 0);
    }
}
