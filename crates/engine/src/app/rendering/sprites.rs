use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("failed to open sprite {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to fetch sprite {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode sprite: {0}")]
    Decode(#[source] image::ImageError),
    #[error("sprite has no pixels")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteRole {
    Player,
    Npc,
    Sword,
    Pickaxe,
    Boar,
}

impl SpriteRole {
    pub const ALL: [SpriteRole; 5] = [
        SpriteRole::Player,
        SpriteRole::Npc,
        SpriteRole::Sword,
        SpriteRole::Pickaxe,
        SpriteRole::Boar,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            SpriteRole::Player | SpriteRole::Npc => "molt.png",
            SpriteRole::Sword => "sword.png",
            SpriteRole::Pickaxe => "pickaxe.png",
            SpriteRole::Boar => "boar.png",
        }
    }

    const fn index(self) -> usize {
        match self {
            SpriteRole::Player => 0,
            SpriteRole::Npc => 1,
            SpriteRole::Sword => 2,
            SpriteRole::Pickaxe => 3,
            SpriteRole::Boar => 4,
        }
    }
}

/// Decoded RGBA8 image, row-major, straight alpha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSprite {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl LoadedSprite {
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, SpriteError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() < expected {
            return Err(SpriteError::Empty);
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba[offset],
            self.rgba[offset + 1],
            self.rgba[offset + 2],
            self.rgba[offset + 3],
        ]
    }
}

pub fn decode_sprite(bytes: &[u8]) -> Result<LoadedSprite, SpriteError> {
    let decoded = image::load_from_memory(bytes).map_err(SpriteError::Decode)?;
    let image = decoded.to_rgba8();
    LoadedSprite::from_rgba(image.width(), image.height(), image.into_raw())
}

pub fn load_sprite_file(path: &Path) -> Result<LoadedSprite, SpriteError> {
    let reader = ImageReader::open(path).map_err(|source| SpriteError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = reader.decode().map_err(SpriteError::Decode)?;
    let image = decoded.to_rgba8();
    LoadedSprite::from_rgba(image.width(), image.height(), image.into_raw())
}

/// Sprites that have arrived so far. Missing roles render as flat shapes.
#[derive(Debug, Clone, Default)]
pub struct SpriteSet {
    slots: [Option<Arc<LoadedSprite>>; 5],
}

impl SpriteSet {
    pub fn insert(&mut self, role: SpriteRole, sprite: Arc<LoadedSprite>) {
        self.slots[role.index()] = Some(sprite);
    }

    pub fn get(&self, role: SpriteRole) -> Option<&LoadedSprite> {
        self.slots[role.index()].as_deref()
    }

    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}
