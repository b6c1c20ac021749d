//! Computed-style value normalization
//!
//! Browsers report computed styles in one serialization while fixtures and
//! scenario authors write them in another (`#000080`, `navy`,
//! `rgb(0,0,128)`). Values are rewritten into a single canonical form before
//! comparison: lowercase, single spaces, `", "` after commas, every color as
//! `rgb(r, g, b)` or `rgba(r, g, b, a)`, and zero lengths without units.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").expect("static regex"));
static PAREN_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s+").expect("static regex"));
static PAREN_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\)").expect("static regex"));
static ZERO_LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\w.])0(?:\.0+)?(?:px|em|rem|pt|vh|vw|ch)\b").expect("static regex")
});

static COLOR_TOKEN: Lazy<Regex> = Lazy::new(|| {
    let mut names: Vec<&str> = NAMED_COLORS.iter().map(|(name, _)| *name).collect();
    // longest first so `darkblue` wins over `blue`
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    let pattern = format!(
        r"#[0-9a-f]{{3,8}}\b|\b(?:rgba?|hsla?)\([^()]*\)|\b(?:{})\b",
        names.join("|")
    );
    Regex::new(&pattern).expect("static regex")
});

const NAMED_COLORS: &[(&str, [u8; 4])] = &[
    ("transparent", [0, 0, 0, 0]),
    ("black", [0, 0, 0, 255]),
    ("silver", [192, 192, 192, 255]),
    ("gray", [128, 128, 128, 255]),
    ("grey", [128, 128, 128, 255]),
    ("white", [255, 255, 255, 255]),
    ("maroon", [128, 0, 0, 255]),
    ("red", [255, 0, 0, 255]),
    ("purple", [128, 0, 128, 255]),
    ("fuchsia", [255, 0, 255, 255]),
    ("magenta", [255, 0, 255, 255]),
    ("green", [0, 128, 0, 255]),
    ("lime", [0, 255, 0, 255]),
    ("olive", [128, 128, 0, 255]),
    ("yellow", [255, 255, 0, 255]),
    ("navy", [0, 0, 128, 255]),
    ("blue", [0, 0, 255, 255]),
    ("teal", [0, 128, 128, 255]),
    ("aqua", [0, 255, 255, 255]),
    ("cyan", [0, 255, 255, 255]),
    ("orange", [255, 165, 0, 255]),
    ("darkblue", [0, 0, 139, 255]),
    ("darkgray", [169, 169, 169, 255]),
    ("darkgrey", [169, 169, 169, 255]),
    ("darkgreen", [0, 100, 0, 255]),
    ("darkred", [139, 0, 0, 255]),
    ("dimgray", [105, 105, 105, 255]),
    ("dimgrey", [105, 105, 105, 255]),
    ("lightgray", [211, 211, 211, 255]),
    ("lightgrey", [211, 211, 211, 255]),
    ("gainsboro", [220, 220, 220, 255]),
    ("whitesmoke", [245, 245, 245, 255]),
    ("gold", [255, 215, 0, 255]),
    ("pink", [255, 192, 203, 255]),
    ("brown", [165, 42, 42, 255]),
    ("indigo", [75, 0, 130, 255]),
    ("violet", [238, 130, 238, 255]),
    ("crimson", [220, 20, 60, 255]),
    ("coral", [255, 127, 80, 255]),
    ("salmon", [250, 128, 114, 255]),
    ("steelblue", [70, 130, 180, 255]),
    ("royalblue", [65, 105, 225, 255]),
    ("dodgerblue", [30, 144, 255, 255]),
    ("skyblue", [135, 206, 235, 255]),
    ("midnightblue", [25, 25, 112, 255]),
];

/// An sRGB color with straight alpha
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    /// Canonical CSS serialization, matching what browsers report for
    /// computed colors.
    pub fn to_css(&self) -> String {
        if alpha_byte(self.a) == 255 {
            format!("rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, format_alpha(self.a))
        }
    }
}

/// Rewrite a style value into its canonical form
pub fn normalize(value: &str) -> String {
    let lowered = value.trim().to_ascii_lowercase().replace('\'', "\"");
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    let colored = COLOR_TOKEN.replace_all(&collapsed, |caps: &Captures| {
        parse_color(&caps[0])
            .map(|c| c.to_css())
            .unwrap_or_else(|| caps[0].to_string())
    });
    let spaced = COMMA.replace_all(&colored, ", ");
    let opened = PAREN_OPEN.replace_all(&spaced, "(");
    let closed = PAREN_CLOSE.replace_all(&opened, ")");
    ZERO_LENGTH.replace_all(&closed, "${1}0").trim().to_string()
}

/// Compare two style values after normalization
pub fn values_match(actual: &str, expected: &str) -> bool {
    normalize(actual) == normalize(expected)
}

/// Parse a single CSS color token
pub fn parse_color(token: &str) -> Option<Color> {
    let token = token.trim().to_ascii_lowercase();

    if let Some(hex) = token.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some(&(_, [r, g, b, a])) = NAMED_COLORS.iter().find(|(name, _)| *name == token) {
        return Some(Color { r, g, b, a: a as f64 / 255.0 });
    }

    let open = token.find('(')?;
    let func = &token[..open];
    let args = token[open + 1..].strip_suffix(')')?;
    let (channels, alpha) = split_args(args)?;

    let a = match alpha {
        Some(raw) => parse_alpha(raw)?,
        None => 1.0,
    };

    match func {
        "rgb" | "rgba" => {
            let r = parse_channel(channels[0])?;
            let g = parse_channel(channels[1])?;
            let b = parse_channel(channels[2])?;
            Some(Color { r, g, b, a })
        }
        "hsl" | "hsla" => {
            let h = parse_hue(channels[0])?;
            let s = parse_percent(channels[1])?;
            let l = parse_percent(channels[2])?;
            let (r, g, b) = hsl_to_rgb(h, s, l);
            Some(Color { r, g, b, a })
        }
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expand = |c: &str| u8::from_str_radix(&c.repeat(2), 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    let (r, g, b, a) = match hex.len() {
        3 => (expand(&hex[0..1])?, expand(&hex[1..2])?, expand(&hex[2..3])?, 255),
        4 => (
            expand(&hex[0..1])?,
            expand(&hex[1..2])?,
            expand(&hex[2..3])?,
            expand(&hex[3..4])?,
        ),
        6 => (pair(0)?, pair(2)?, pair(4)?, 255),
        8 => (pair(0)?, pair(2)?, pair(4)?, pair(6)?),
        _ => return None,
    };
    Some(Color { r, g, b, a: a as f64 / 255.0 })
}

/// Accepts both `r, g, b[, a]` and `r g b[ / a]`
fn split_args(args: &str) -> Option<([&str; 3], Option<&str>)> {
    let (main, slash_alpha) = match args.split_once('/') {
        Some((m, a)) => (m, Some(a.trim())),
        None => (args, None),
    };

    let parts: Vec<&str> = if main.contains(',') {
        main.split(',').map(str::trim).filter(|p| !p.is_empty()).collect()
    } else {
        main.split_whitespace().collect()
    };

    match (parts.len(), slash_alpha) {
        (3, alpha) => Some(([parts[0], parts[1], parts[2]], alpha)),
        (4, None) => Some(([parts[0], parts[1], parts[2]], Some(parts[3]))),
        _ => None,
    }
}

fn parse_channel(raw: &str) -> Option<u8> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? * 255.0 / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(raw: &str) -> Option<f64> {
    let value = match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
        None => raw.parse::<f64>().ok()?,
    };
    Some(value.clamp(0.0, 1.0))
}

fn parse_percent(raw: &str) -> Option<f64> {
    let value = raw.strip_suffix('%').unwrap_or(raw).trim().parse::<f64>().ok()?;
    Some((value / 100.0).clamp(0.0, 1.0))
}

/// Hue in turns (0.0..1.0)
fn parse_hue(raw: &str) -> Option<f64> {
    let degrees = if let Some(v) = raw.strip_suffix("deg") {
        v.parse::<f64>().ok()?
    } else if let Some(v) = raw.strip_suffix("turn") {
        v.parse::<f64>().ok()? * 360.0
    } else if let Some(v) = raw.strip_suffix("rad") {
        v.parse::<f64>().ok()?.to_degrees()
    } else {
        raw.parse::<f64>().ok()?
    };
    Some(degrees.rem_euclid(360.0) / 360.0)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    let channel = |t: f64| {
        let t = t.rem_euclid(1.0);
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };

    (channel(h + 1.0 / 3.0), channel(h), channel(h - 1.0 / 3.0))
}

/// Browsers keep alpha as one byte
fn alpha_byte(a: f64) -> u8 {
    (a.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Shortest of two or three decimals that maps back to the same alpha byte
fn format_alpha(a: f64) -> String {
    let byte = alpha_byte(a);
    let exact = byte as f64 / 255.0;
    let two = (exact * 100.0).round() / 100.0;
    let value = if alpha_byte(two) == byte {
        two
    } else {
        (exact * 1000.0).round() / 1000.0
    };
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}
