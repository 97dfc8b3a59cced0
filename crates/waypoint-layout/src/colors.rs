//! Color palettes for waypoint rendering
//!
//! Branch palettes distinguish exploration branches; category colours tint
//! unvisited places on the map. Renderers pick which to use.

use waypoint_types::Category;

use crate::radial::Branch;

/// 8-bit sRGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

// =============================================================================
// BRANCH COLORS
// =============================================================================

/// Colours for one exploration branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchPalette {
    pub border: Rgb,
    pub background: Rgb,
    pub text: Rgb,
    /// Glow around unvisited nodes, drawn at 25% opacity
    pub glow: Rgb,
}

pub const BRANCH_COLORS: [BranchPalette; 6] = [
    // Indigo
    BranchPalette {
        border: Rgb(0x81, 0x8c, 0xf8),
        background: Rgb(0x1e, 0x1b, 0x4b),
        text: Rgb(0xc7, 0xd2, 0xfe),
        glow: Rgb(129, 140, 248),
    },
    // Emerald
    BranchPalette {
        border: Rgb(0x34, 0xd3, 0x99),
        background: Rgb(0x02, 0x2c, 0x22),
        text: Rgb(0xa7, 0xf3, 0xd0),
        glow: Rgb(52, 211, 153),
    },
    // Orange
    BranchPalette {
        border: Rgb(0xfb, 0x92, 0x3c),
        background: Rgb(0x43, 0x14, 0x07),
        text: Rgb(0xfe, 0xd7, 0xaa),
        glow: Rgb(251, 146, 60),
    },
    // Pink
    BranchPalette {
        border: Rgb(0xf4, 0x72, 0xb6),
        background: Rgb(0x50, 0x07, 0x24),
        text: Rgb(0xfb, 0xcf, 0xe8),
        glow: Rgb(244, 114, 182),
    },
    // Sky
    BranchPalette {
        border: Rgb(0x38, 0xbd, 0xf8),
        background: Rgb(0x08, 0x2f, 0x49),
        text: Rgb(0xba, 0xe6, 0xfd),
        glow: Rgb(56, 189, 248),
    },
    // Lime
    BranchPalette {
        border: Rgb(0xa3, 0xe6, 0x35),
        background: Rgb(0x1a, 0x2e, 0x05),
        text: Rgb(0xd9, 0xf9, 0x9d),
        glow: Rgb(163, 230, 53),
    },
];

/// Root node and root → first-level edges
pub const ROOT_COLOR: Rgb = Rgb(0x03, 0x40, 0x78);

/// Visited, non-root nodes
pub const VISITED_COLOR: Rgb = Rgb(0x9c, 0xa3, 0xaf);

/// Unvisited nodes without a known category
pub const UNCATEGORIZED_COLOR: Rgb = Rgb(0xde, 0xde, 0xe0);

/// Palette for a branch; indices wrap around the palette. `None` for the root.
pub fn branch_palette(branch: Branch) -> Option<&'static BranchPalette> {
    branch
        .color_index()
        .map(|i| &BRANCH_COLORS[i % BRANCH_COLORS.len()])
}

/// Edge stroke: branch border, or the root colour for first-level edges.
pub fn edge_color(branch: Branch) -> Rgb {
    branch_palette(branch)
        .map(|p| p.border)
        .unwrap_or(ROOT_COLOR)
}

// =============================================================================
// CATEGORY COLORS
// =============================================================================

pub fn category_color(category: Category) -> Rgb {
    match category {
        Category::Museum => Rgb(0xb4, 0x8e, 0xae),
        Category::Restaurant | Category::Cafe => Rgb(0xde, 0x54, 0x1e),
        Category::Shop => Rgb(0x63, 0x69, 0xd1),
        Category::Attraction => Rgb(0xff, 0xa6, 0x30),
        Category::Park => Rgb(0x69, 0x99, 0x5d),
        Category::Other => UNCATEGORIZED_COLOR,
    }
}

/// Marker fill: root first, then visited, then category.
pub fn node_fill(category: Option<Category>, visited: bool, is_root: bool) -> Rgb {
    if is_root {
        return ROOT_COLOR;
    }
    if visited {
        return VISITED_COLOR;
    }
    category.map(category_color).unwrap_or(UNCATEGORIZED_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_palette_wraps() {
        assert_eq!(
            branch_palette(Branch::Index(7)),
            branch_palette(Branch::Index(1))
        );
        assert!(branch_palette(Branch::Root).is_none());
    }

    #[test]
    fn test_edge_color_for_root_branch() {
        assert_eq!(edge_color(Branch::Root), ROOT_COLOR);
        assert_eq!(edge_color(Branch::Index(0)).to_hex(), "#818cf8");
    }

    #[test]
    fn test_node_fill_precedence() {
        assert_eq!(node_fill(Some(Category::Park), true, true), ROOT_COLOR);
        assert_eq!(node_fill(Some(Category::Park), true, false), VISITED_COLOR);
        assert_eq!(node_fill(Some(Category::Park), false, false).to_hex(), "#69995d");
        assert_eq!(node_fill(None, false, false), UNCATEGORIZED_COLOR);
    }
}
