use anyhow::{Result, anyhow};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb` (the leading `#` is optional).
    pub fn parse_hex(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(anyhow!("invalid color '{}' (expected #rrggbb)", value));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|err| anyhow!("invalid color '{}': {}", value, err))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_unit(self) -> (f32, f32, f32) {
        (
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub class_name: String,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorMap {
    entries: Vec<LegendEntry>,
}

impl Default for ColorMap {
    fn default() -> Self {
        let mut map = Self::empty();
        map.insert("Caries", Rgb::new(255, 0, 0));
        map.insert("Deep Caries", Rgb::new(128, 0, 128));
        map.insert("Impacted", Rgb::new(0, 0, 255));
        map.insert("Periapical Lesion", Rgb::new(0, 255, 0));
        map
    }
}

impl ColorMap {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Replaces the color of an existing class in place, otherwise appends.
    pub fn insert(&mut self, class_name: &str, color: Rgb) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.class_name == class_name)
        {
            entry.color = color;
            return;
        }
        self.entries.push(LegendEntry {
            class_name: class_name.to_string(),
            color,
        });
    }

    pub fn color_for(&self, class_name: &str) -> Rgb {
        self.entries
            .iter()
            .find(|entry| entry.class_name == class_name)
            .map(|entry| entry.color)
            .unwrap_or(Rgb::WHITE)
    }

    pub fn entries(&self) -> &[LegendEntry] {
        &self.entries
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|entry| entry.class_name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
