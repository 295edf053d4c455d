//! Theme resolution: partial styling config + compiled-in defaults.
//!
//! Resolution never fails. Stored values that are missing or malformed
//! fall back to the defaults; `validate` is what rejects bad input on write.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::content::block_render::is_safe_url;
use crate::models::StylingConfig;

pub const DEFAULT_PRIMARY_COLOR: &str = "#0A0A0A";
pub const DEFAULT_SECONDARY_COLOR: &str = "#7A7A7A";
pub const DEFAULT_ACCENT_COLOR: &str = "#24c598";
pub const DEFAULT_FONT: &str = "Inter";
pub const DEFAULT_BLOCK_SPACING: i64 = 24;
pub const DEFAULT_SECTION_PADDING: i64 = 40;

/// Font families a document may choose from.
pub const ALLOWED_FONTS: &[&str] = &[
    "Inter",
    "Roboto",
    "Open Sans",
    "Lato",
    "Montserrat",
    "Poppins",
    "Source Sans Pro",
    "Raleway",
];

const MAX_SPACING: i64 = 200;
const MAX_LOGO_DIMENSION: i64 = 2000;

/// Regex for `#RRGGBB` colors.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid regex literal"));

/// Fully resolved styling, every value present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTheme {
    pub logo: Option<ResolvedLogo>,
    pub colors: ResolvedColors,
    pub fonts: ResolvedFonts,
    pub spacing: ResolvedSpacing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLogo {
    pub url: String,
    pub alt: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFonts {
    pub primary: String,
    pub secondary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSpacing {
    pub block_spacing: i64,
    pub section_padding: i64,
}

impl Default for ResolvedTheme {
    fn default() -> Self {
        resolve(None)
    }
}

fn color(value: Option<&String>, default: &str) -> String {
    value
        .filter(|c| is_hex_color(c))
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn font(value: Option<&String>) -> String {
    value
        .filter(|f| is_allowed_font(f))
        .cloned()
        .unwrap_or_else(|| DEFAULT_FONT.to_string())
}

fn spacing(value: Option<i64>, default: i64) -> i64 {
    value
        .filter(|v| (0..=MAX_SPACING).contains(v))
        .unwrap_or(default)
}

/// Resolve a stored (possibly absent) styling config against the defaults.
pub fn resolve(config: Option<&StylingConfig>) -> ResolvedTheme {
    let colors = config.map(|c| &c.colors);
    let fonts = config.and_then(|c| c.fonts.as_ref());
    let spacing_config = config.and_then(|c| c.spacing.as_ref());

    let logo = config
        .and_then(|c| c.logo.as_ref())
        .filter(|l| is_safe_url(&l.url))
        .map(|l| ResolvedLogo {
            url: l.url.clone(),
            alt: l.alt.clone().unwrap_or_default(),
            width: l.width.filter(|w| (1..=MAX_LOGO_DIMENSION).contains(w)),
            height: l.height.filter(|h| (1..=MAX_LOGO_DIMENSION).contains(h)),
        });

    ResolvedTheme {
        logo,
        colors: ResolvedColors {
            primary: color(colors.and_then(|c| c.primary.as_ref()), DEFAULT_PRIMARY_COLOR),
            secondary: color(
                colors.and_then(|c| c.secondary.as_ref()),
                DEFAULT_SECONDARY_COLOR,
            ),
            accent: color(colors.and_then(|c| c.accent.as_ref()), DEFAULT_ACCENT_COLOR),
        },
        fonts: ResolvedFonts {
            primary: font(fonts.and_then(|f| f.primary.as_ref())),
            secondary: font(fonts.and_then(|f| f.secondary.as_ref())),
        },
        spacing: ResolvedSpacing {
            block_spacing: spacing(
                spacing_config.and_then(|s| s.block_spacing),
                DEFAULT_BLOCK_SPACING,
            ),
            section_padding: spacing(
                spacing_config.and_then(|s| s.section_padding),
                DEFAULT_SECTION_PADDING,
            ),
        },
    }
}

pub fn is_hex_color(value: &str) -> bool {
    HEX_COLOR.is_match(value)
}

pub fn is_allowed_font(value: &str) -> bool {
    ALLOWED_FONTS.contains(&value)
}

/// Validate a styling config before it is stored.
pub fn validate(config: &StylingConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(logo) = &config.logo {
        if !is_safe_url(&logo.url) {
            errors.push("logo.url must be an http(s) URL or start with '/'".to_string());
        }
        for (name, value) in [("logo.width", logo.width), ("logo.height", logo.height)] {
            if let Some(v) = value
                && !(1..=MAX_LOGO_DIMENSION).contains(&v)
            {
                errors.push(format!("{name} must be between 1 and {MAX_LOGO_DIMENSION}"));
            }
        }
    }

    for (name, value) in [
        ("colors.primary", &config.colors.primary),
        ("colors.secondary", &config.colors.secondary),
        ("colors.accent", &config.colors.accent),
    ] {
        if let Some(c) = value
            && !is_hex_color(c)
        {
            errors.push(format!("{name} must be a hex color like #1A2B3C"));
        }
    }

    if let Some(fonts) = &config.fonts {
        for (name, value) in [
            ("fonts.primary", &fonts.primary),
            ("fonts.secondary", &fonts.secondary),
        ] {
            if let Some(f) = value
                && !is_allowed_font(f)
            {
                errors.push(format!("{name} '{f}' is not an allowed font"));
            }
        }
    }

    if let Some(s) = &config.spacing {
        for (name, value) in [
            ("spacing.blockSpacing", s.block_spacing),
            ("spacing.sectionPadding", s.section_padding),
        ] {
            if let Some(v) = value
                && !(0..=MAX_SPACING).contains(&v)
            {
                errors.push(format!("{name} must be between 0 and {MAX_SPACING}"));
            }
        }
    }

    errors
}

impl ResolvedTheme {
    /// CSS custom properties for the public page.
    pub fn css_variables(&self) -> String {
        format!(
            ":root{{--color-primary:{};--color-secondary:{};--color-accent:{};\
             --font-primary:'{}';--font-secondary:'{}';\
             --block-spacing:{}px;--section-padding:{}px}}",
            self.colors.primary,
            self.colors.secondary,
            self.colors.accent,
            self.fonts.primary,
            self.fonts.secondary,
            self.spacing.block_spacing,
            self.spacing.section_padding,
        )
    }
}
