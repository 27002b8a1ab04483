use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const DEFAULT_WORLD_EXTENT: u32 = 256;
pub const DEFAULT_MAX_HP: f32 = 100.0;
pub const SKY_TILE: u16 = 6;
pub const VOID_TILE: u16 = 0;

/// Full world state as pushed by the server.
///
/// Snapshots are never merged: each one replaces the previous one whole.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    #[serde(default)]
    world_width: Option<u32>,
    #[serde(default)]
    world_height: Option<u32>,
    #[serde(default)]
    world_size: Option<u32>,
    pub tiles: TileGrid,
    #[serde(default)]
    pub players: Vec<Actor>,
    #[serde(default)]
    pub npcs: Vec<Actor>,
    #[serde(default)]
    pub animals: Vec<Creature>,
    #[serde(default)]
    pub chat: Option<Vec<ChatLine>>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub world_seed: Option<String>,
    #[serde(default)]
    pub world_seed_int: Option<i64>,
    #[serde(default)]
    pub x: Option<i64>,
    #[serde(default)]
    pub y: Option<i64>,
    #[serde(default)]
    pub w: Option<i64>,
    #[serde(default)]
    pub h: Option<i64>,
}

impl WorldSnapshot {
    pub fn width(&self) -> u32 {
        resolve_extent(self.world_width, self.world_size)
    }

    pub fn height(&self) -> u32 {
        resolve_extent(self.world_height, self.world_size)
    }

    pub fn tile_at(&self, x: i64, y: i64) -> Option<u16> {
        self.tiles.tile_at(x, y, self.width())
    }

    /// Identity used to decide whether cached per-world values are still valid.
    pub fn world_key(&self) -> WorldKey {
        if let Some(seed) = self.world_seed_int {
            return WorldKey::SeedInt(seed);
        }
        if let Some(seed) = self.world_seed.as_ref() {
            return WorldKey::Seed(seed.clone());
        }
        WorldKey::Dimensions(self.width(), self.height())
    }

    pub fn seed_label(&self) -> Option<String> {
        self.world_seed_int
            .map(|seed| seed.to_string())
            .or_else(|| self.world_seed.clone())
    }

    /// Players first, then npcs, then animals; first case-insensitive match wins.
    pub fn find_by_name(&self, name: &str) -> Option<FocusRef<'_>> {
        if let Some(actor) = self
            .players
            .iter()
            .find(|actor| actor.name.eq_ignore_ascii_case(name))
        {
            return Some(FocusRef::Actor(actor));
        }
        if let Some(actor) = self
            .npcs
            .iter()
            .find(|actor| actor.name.eq_ignore_ascii_case(name))
        {
            return Some(FocusRef::Actor(actor));
        }
        self.animals
            .iter()
            .find(|creature| {
                creature
                    .name
                    .as_deref()
                    .is_some_and(|creature_name| creature_name.eq_ignore_ascii_case(name))
            })
            .map(FocusRef::Creature)
    }

    /// Actor occupying the given tile, players before npcs.
    pub fn actor_on_tile(&self, tile_x: i64, tile_y: i64) -> Option<&Actor> {
        self.players
            .iter()
            .chain(self.npcs.iter())
            .find(|actor| actor.tile() == (tile_x, tile_y))
    }

    pub fn listed_actors(&self) -> impl Iterator<Item = &Actor> {
        self.players.iter().chain(self.npcs.iter())
    }

    /// Position the overview and minimap treat as "the" point of interest.
    pub fn default_focus(&self) -> Option<(f32, f32)> {
        self.players
            .first()
            .or_else(|| self.npcs.first())
            .map(|actor| (actor.x, actor.y))
            .or_else(|| self.animals.first().map(|creature| (creature.x, creature.y)))
    }
}

fn resolve_extent(primary: Option<u32>, fallback: Option<u32>) -> u32 {
    primary
        .filter(|value| *value > 0)
        .or(fallback.filter(|value| *value > 0))
        .unwrap_or(DEFAULT_WORLD_EXTENT)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldKey {
    SeedInt(i64),
    Seed(String),
    Dimensions(u32, u32),
}

#[derive(Debug, Clone, Copy)]
pub enum FocusRef<'a> {
    Actor(&'a Actor),
    Creature(&'a Creature),
}

impl FocusRef<'_> {
    pub fn position(&self) -> (f32, f32) {
        match self {
            FocusRef::Actor(actor) => (actor.x, actor.y),
            FocusRef::Creature(creature) => (creature.x, creature.y),
        }
    }
}

/// Tile storage as received. Both layouts are row-major; the variant is fixed
/// when the snapshot is decoded so lookups never have to sniff the shape.
#[derive(Debug, Clone, PartialEq)]
pub enum TileGrid {
    Flat(Vec<u16>),
    Rows(Vec<Vec<u16>>),
}

impl TileGrid {
    pub fn tile_at(&self, x: i64, y: i64, width: u32) -> Option<u16> {
        if x < 0 || y < 0 {
            return None;
        }
        match self {
            TileGrid::Flat(tiles) => {
                if x >= width as i64 {
                    return None;
                }
                let index = (y as usize)
                    .checked_mul(width as usize)?
                    .checked_add(x as usize)?;
                tiles.get(index).copied()
            }
            TileGrid::Rows(rows) => rows.get(y as usize)?.get(x as usize).copied(),
        }
    }
}

impl<'de> Deserialize<'de> for TileGrid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawGrid {
            Flat(Vec<u16>),
            Rows(Vec<Vec<u16>>),
        }

        Ok(match RawGrid::deserialize(deserializer)? {
            RawGrid::Flat(tiles) => TileGrid::Flat(tiles),
            RawGrid::Rows(rows) => TileGrid::Rows(rows),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn from_velocity(vx: Option<f32>) -> Self {
        match vx {
            Some(vx) if vx < 0.0 => Facing::Left,
            _ => Facing::Right,
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

impl<'de> Deserialize<'de> for Facing {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let facing = match &value {
            Value::Number(number) if number.as_f64() == Some(0.0) => Facing::Left,
            Value::String(text) if text.eq_ignore_ascii_case("left") => Facing::Left,
            _ => Facing::Right,
        };
        Ok(facing)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(default, rename = "look", alias = "facing")]
    pub facing: Facing,
    #[serde(default)]
    pub hp: Option<f32>,
    #[serde(default)]
    pub max_hp: Option<f32>,
    #[serde(default, deserialize_with = "de_opt_millis")]
    pub damaged_until: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_millis")]
    pub fighting_until: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_millis")]
    pub mining_until: Option<u64>,
    #[serde(default)]
    pub active_tool: Option<String>,
    #[serde(default)]
    pub stats: Option<ActorStats>,
}

impl Actor {
    pub fn tile(&self) -> (i64, i64) {
        (self.x.floor() as i64, self.y.floor() as i64)
    }

    /// Remaining health in `[0, 1]`, or `None` when no bar should be drawn.
    pub fn health_fraction(&self) -> Option<f32> {
        let hp = self.hp?;
        let max_hp = self
            .max_hp
            .filter(|max| *max > 0.0)
            .unwrap_or(DEFAULT_MAX_HP);
        if hp >= max_hp {
            return None;
        }
        Some((hp / max_hp).clamp(0.0, 1.0))
    }

    pub fn holds_pick(&self) -> bool {
        self.active_tool.as_deref() == Some("pick")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorStats {
    #[serde(default)]
    pub kills: u64,
    #[serde(default)]
    pub deaths: u64,
    #[serde(default)]
    pub blocks_mined: u64,
    #[serde(default)]
    pub items_crafted: u64,
    #[serde(default)]
    pub playtime_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Creature {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub vx: Option<f32>,
}

impl Creature {
    pub fn facing(&self) -> Facing {
        Facing::from_velocity(self.vx)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatLine {
    #[serde(default, alias = "timestamp", deserialize_with = "de_opt_millis")]
    pub ts: Option<u64>,
    pub message: String,
}

pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => de_id(value).map(Some).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn de_opt_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|value| value.is_finite() && *value > 0.0)
        .map(|value| value as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> WorldSnapshot {
        serde_json::from_str(json).expect("snapshot should parse")
    }

    #[test]
    fn flat_and_nested_grids_index_identically() {
        let flat = parse(r#"{"worldWidth":3,"worldHeight":2,"tiles":[0,1,2,3,4,5]}"#);
        let nested = parse(r#"{"worldWidth":3,"worldHeight":2,"tiles":[[0,1,2],[3,4,5]]}"#);

        assert!(matches!(flat.tiles, TileGrid::Flat(_)));
        assert!(matches!(nested.tiles, TileGrid::Rows(_)));
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(flat.tile_at(x, y), nested.tile_at(x, y), "x={x} y={y}");
            }
        }
        assert_eq!(flat.tile_at(2, 1), Some(5));
        assert_eq!(flat.tile_at(3, 0), None);
        assert_eq!(nested.tile_at(-1, 0), None);
        assert_eq!(nested.tile_at(0, 2), None);
    }

    #[test]
    fn extents_fall_back_to_world_size_then_default() {
        let sized = parse(r#"{"worldSize":64,"tiles":[]}"#);
        assert_eq!((sized.width(), sized.height()), (64, 64));

        let bare = parse(r#"{"worldWidth":0,"tiles":[]}"#);
        assert_eq!(bare.width(), DEFAULT_WORLD_EXTENT);
    }

    #[test]
    fn facing_accepts_numeric_and_text_forms() {
        let snapshot = parse(
            r#"{"tiles":[],"players":[
                {"id":1,"name":"a","x":0,"y":0,"look":0},
                {"id":"p2","name":"b","x":0,"y":0,"look":1},
                {"id":"p3","name":"c","x":0,"y":0,"facing":"left"},
                {"id":"p4","name":"d","x":0,"y":0}
            ]}"#,
        );
        let facings: Vec<Facing> = snapshot.players.iter().map(|p| p.facing).collect();
        assert_eq!(
            facings,
            vec![Facing::Left, Facing::Right, Facing::Left, Facing::Right]
        );
        assert_eq!(snapshot.players[0].id, "1");
    }

    #[test]
    fn find_by_name_prefers_players_then_npcs_then_animals() {
        let snapshot = parse(
            r#"{"tiles":[],
                "players":[{"id":"p","name":"Ada","x":1,"y":1}],
                "npcs":[{"id":"n","name":"ada","x":2,"y":2},{"id":"n2","name":"Bob","x":3,"y":3}],
                "animals":[{"id":"a","type":"boar","name":"BOB","x":4,"y":4},
                           {"id":"a2","type":"boar","name":"Hog","x":5,"y":5}]}"#,
        );

        assert_eq!(snapshot.find_by_name("ADA").map(|f| f.position()), Some((1.0, 1.0)));
        assert_eq!(snapshot.find_by_name("bob").map(|f| f.position()), Some((3.0, 3.0)));
        assert_eq!(snapshot.find_by_name("hog").map(|f| f.position()), Some((5.0, 5.0)));
        assert!(snapshot.find_by_name("nobody").is_none());
    }

    #[test]
    fn health_fraction_only_when_below_max() {
        let snapshot = parse(
            r#"{"tiles":[],"players":[
                {"id":"a","name":"a","x":0,"y":0,"hp":100},
                {"id":"b","name":"b","x":0,"y":0,"hp":30,"maxHp":60},
                {"id":"c","name":"c","x":0,"y":0}
            ]}"#,
        );
        assert_eq!(snapshot.players[0].health_fraction(), None);
        assert_eq!(snapshot.players[1].health_fraction(), Some(0.5));
        assert_eq!(snapshot.players[2].health_fraction(), None);
    }

    #[test]
    fn world_key_prefers_integer_seed() {
        let both = parse(r#"{"tiles":[],"worldSeed":"abc","worldSeedInt":7}"#);
        let text = parse(r#"{"tiles":[],"worldSeed":"abc"}"#);
        let none = parse(r#"{"worldWidth":8,"worldHeight":4,"tiles":[]}"#);

        assert_eq!(both.world_key(), WorldKey::SeedInt(7));
        assert_eq!(text.world_key(), WorldKey::Seed("abc".to_string()));
        assert_eq!(none.world_key(), WorldKey::Dimensions(8, 4));
        assert_eq!(both.seed_label().as_deref(), Some("7"));
    }

    #[test]
    fn numeric_world_seed_is_read_as_text() {
        let snapshot = parse(r#"{"tiles":[],"worldSeed":12345}"#);
        assert_eq!(snapshot.world_seed.as_deref(), Some("12345"));
        assert_eq!(snapshot.world_key(), WorldKey::Seed("12345".to_string()));

        let null = parse(r#"{"tiles":[],"worldSeed":null}"#);
        assert_eq!(null.world_seed, None);
    }

    #[test]
    fn chat_accepts_timestamp_alias() {
        let snapshot = parse(r#"{"tiles":[],"chat":[{"timestamp":12,"message":"hi"}]}"#);
        let chat = snapshot.chat.expect("chat present");
        assert_eq!(chat[0].ts, Some(12));
        assert_eq!(chat[0].message, "hi");
    }
}
