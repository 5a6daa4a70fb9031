//! UUID-keyed tile registry and instantiation arguments.
//!
//! A [`Tileset`] maps tile UUIDs to factories producing [`GameObject`]s.
//! Loaders look tiles up by the UUID string stored in a level file and
//! pass the cell's argument list through to the factory.

use indexmap::IndexMap;

use wisp_core::{Coord, TilesetError};

use crate::object::GameObject;

/// Argument type: initial cell temperature (float or double value).
pub const ARG_INITIAL_TEMPERATURE: i32 = 1;

/// Argument type: fan intensity (float or double value).
pub const ARG_FAN_INTENSITY: i32 = 2;

/// One typed tile argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum TileArgValue {
    /// UTF-8 string.
    Str(String),
    /// 32-bit float.
    F32(f32),
    /// 64-bit float.
    F64(f64),
    /// Signed integer.
    I64(i64),
    /// Unsigned integer.
    U64(u64),
    /// Boolean.
    Bool(bool),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Coordinate pair.
    Point(Coord),
}

/// Ordered multimap of `(argument type, value)` pairs attached to a tile
/// placement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TileArgv(pub Vec<(i32, TileArgValue)>);

impl TileArgv {
    /// An empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument.
    pub fn push(&mut self, arg_type: i32, value: TileArgValue) {
        self.0.push((arg_type, value));
    }

    /// The first value of the given type, if any.
    pub fn first_of(&self, arg_type: i32) -> Option<&TileArgValue> {
        self.0
            .iter()
            .find(|(t, _)| *t == arg_type)
            .map(|(_, v)| v)
    }

    /// The first float-typed value of the given type, widened to `f64`.
    pub fn first_float(&self, arg_type: i32) -> Option<f64> {
        self.0.iter().find_map(|(t, v)| {
            if *t != arg_type {
                return None;
            }
            match v {
                TileArgValue::F32(f) => Some(*f as f64),
                TileArgValue::F64(f) => Some(*f),
                _ => None,
            }
        })
    }

    /// The placement temperature, defaulting to 1.0.
    pub fn initial_temperature(&self) -> f64 {
        self.first_float(ARG_INITIAL_TEMPERATURE).unwrap_or(1.0)
    }
}

/// Factory producing a fresh object for a tile placement.
pub type TileFactory = Box<dyn Fn(&TileArgv) -> GameObject + Send + Sync>;

/// One registered tile class.
pub struct TileDef {
    id: String,
    display_name: String,
    factory: TileFactory,
}

impl TileDef {
    /// Define a tile class.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        factory: TileFactory,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            factory,
        }
    }

    /// The tile's UUID string.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Instantiate an object for a placement.
    pub fn instantiate(&self, argv: &TileArgv) -> GameObject {
        (self.factory)(argv)
    }
}

/// UUID-keyed registry of tile classes with deterministic iteration
/// order.
#[derive(Default)]
pub struct Tileset {
    tiles: IndexMap<String, TileDef>,
}

impl Tileset {
    /// An empty tileset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tile class.
    ///
    /// # Errors
    ///
    /// [`TilesetError::DuplicateTile`] when the UUID is already taken.
    pub fn register_tile(&mut self, tile: TileDef) -> Result<(), TilesetError> {
        if self.tiles.contains_key(tile.id()) {
            return Err(TilesetError::DuplicateTile {
                id: tile.id().to_string(),
            });
        }
        self.tiles.insert(tile.id().to_string(), tile);
        Ok(())
    }

    /// Look a tile class up by UUID.
    pub fn tile(&self, id: &str) -> Option<&TileDef> {
        self.tiles.get(id)
    }

    /// Instantiate an object for the UUID, or report the missing tile.
    ///
    /// # Errors
    ///
    /// [`TilesetError::UnknownTile`] when no class is registered for the
    /// UUID.
    pub fn make_tile(&self, id: &str, argv: &TileArgv) -> Result<GameObject, TilesetError> {
        match self.tiles.get(id) {
            Some(def) => Ok(def.instantiate(argv)),
            None => Err(TilesetError::UnknownTile { id: id.to_string() }),
        }
    }

    /// Iterate over the registered tile classes in registration order.
    pub fn tiles(&self) -> impl Iterator<Item = &TileDef> {
        self.tiles.values()
    }
}

/// Well-known UUID of the wall tile.
pub const TILE_WALL: &str = "25d7d8c9-9c6e-4d66-b945-5e3da6a3eb22";
/// Well-known UUID of the safe wall tile.
pub const TILE_SAFE_WALL: &str = "7a3a2559-0a5b-4cc4-8c99-bdaf06e70a3f";
/// Well-known UUID of the round wall tile.
pub const TILE_ROUND_WALL: &str = "0d2f08d2-0de4-4ea2-9e09-7ad56ee77b4e";
/// Well-known UUID of the rock tile.
pub const TILE_ROCK: &str = "c2bd2fab-41c8-4e62-a80e-243be3df9f14";
/// Well-known UUID of the dirt tile.
pub const TILE_DIRT: &str = "8a430232-5a2f-4b6a-9e91-3b79a7e6a571";
/// Well-known UUID of the bomb tile.
pub const TILE_BOMB: &str = "e35b3a91-ad7b-4cfe-9fd5-0ad3a24d5a62";
/// Well-known UUID of the player spawn tile.
pub const TILE_PLAYER: &str = "f5f64c16-fc7e-4b01-9e34-9e2b0ad2f0c5";
/// Well-known UUID of the horizontal fan tile.
pub const TILE_HORIZ_FAN: &str = "50d327ae-33c2-4c5a-a822-ccc9a9ec0ac5";
/// Well-known UUID of the vertical fan tile.
pub const TILE_VERT_FAN: &str = "4e7e5f76-3b58-4a85-bbc5-3b2e1154d844";

/// The built-in tile classes under their well-known UUIDs.
pub fn standard_tileset() -> Tileset {
    let mut tileset = Tileset::new();
    let tiles: Vec<(&str, &str, TileFactory)> = vec![
        ("wall", TILE_WALL, Box::new(|_: &TileArgv| GameObject::wall())),
        (
            "safe wall",
            TILE_SAFE_WALL,
            Box::new(|_: &TileArgv| GameObject::safe_wall()),
        ),
        (
            "round wall",
            TILE_ROUND_WALL,
            Box::new(|_: &TileArgv| GameObject::round_wall()),
        ),
        ("rock", TILE_ROCK, Box::new(|_: &TileArgv| GameObject::rock())),
        ("dirt", TILE_DIRT, Box::new(|_: &TileArgv| GameObject::dirt())),
        ("bomb", TILE_BOMB, Box::new(|_: &TileArgv| GameObject::bomb())),
        (
            "player",
            TILE_PLAYER,
            Box::new(|_: &TileArgv| GameObject::player()),
        ),
        (
            "horizontal fan",
            TILE_HORIZ_FAN,
            Box::new(|argv: &TileArgv| {
                GameObject::horiz_fan(argv.first_float(ARG_FAN_INTENSITY).unwrap_or(1.0))
            }),
        ),
        (
            "vertical fan",
            TILE_VERT_FAN,
            Box::new(|argv: &TileArgv| {
                GameObject::vert_fan(argv.first_float(ARG_FAN_INTENSITY).unwrap_or(1.0))
            }),
        ),
    ];
    for (name, id, factory) in tiles {
        tileset
            .register_tile(TileDef::new(id, name, factory))
            .expect("well-known uuids are distinct");
    }
    tileset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut tileset = standard_tileset();
        let err = tileset.register_tile(TileDef::new(
            TILE_ROCK,
            "rock again",
            Box::new(|_| GameObject::rock()),
        ));
        assert_eq!(
            err,
            Err(TilesetError::DuplicateTile {
                id: TILE_ROCK.to_string()
            })
        );
    }

    #[test]
    fn unknown_uuid_is_reported() {
        let tileset = standard_tileset();
        let err = tileset.make_tile("no-such-tile", &TileArgv::new());
        assert!(matches!(err, Err(TilesetError::UnknownTile { .. })));
    }

    #[test]
    fn fan_intensity_comes_from_argv() {
        let tileset = standard_tileset();
        let mut argv = TileArgv::new();
        argv.push(ARG_FAN_INTENSITY, TileArgValue::F32(3.0));
        let fan = tileset.make_tile(TILE_HORIZ_FAN, &argv).unwrap();
        assert_eq!(fan.kind, ObjectKind::HorizFan { intensity: 3.0 });
    }

    #[test]
    fn initial_temperature_defaults_to_one() {
        let argv = TileArgv::new();
        assert_eq!(argv.initial_temperature(), 1.0);

        let mut argv = TileArgv::new();
        argv.push(ARG_INITIAL_TEMPERATURE, TileArgValue::F64(2.5));
        assert_eq!(argv.initial_temperature(), 2.5);
        // Float variant is accepted too.
        let mut argv = TileArgv::new();
        argv.push(ARG_INITIAL_TEMPERATURE, TileArgValue::F32(0.5));
        assert_eq!(argv.initial_temperature(), 0.5);
    }
}
