// r_error.rs — renderer error types

use thiserror::Error;

/// Fatal problems with a map tile or tile list. Map files are trusted build
/// output, so none of these are retried.
#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{name} is not a BSP file")]
    BadIdent { name: String },

    #[error("{name} has wrong version number ({found} should be {expected})")]
    BadVersion { name: String, found: i32, expected: i32 },

    #[error("lump {lump} of {name} lies outside the file")]
    LumpOutOfBounds { name: String, lump: usize },

    #[error("funny lump size in {name}: {what}")]
    FunnyLumpSize { name: String, what: &'static str },

    #[error("{name}: too many {what} ({count} > {max})")]
    LumpTooLarge { name: String, what: &'static str, count: usize, max: usize },

    #[error("{name} has bad light quant {quant}")]
    BadLightQuant { name: String, quant: u8 },

    #[error("{name}: bad surface extents on face {face}")]
    BadExtents { name: String, face: usize },

    #[error("bad surfedges count in {name}: {count}")]
    BadSurfedgeCount { name: String, count: usize },

    #[error("{name}: {what} {index} out of range")]
    BadIndex { name: String, what: &'static str, index: i64 },

    #[error("{name}: face {face} light samples exceed the lighting lump")]
    BadLightOffset { name: String, face: usize },

    #[error("{name} has no world model")]
    NoSubmodels { name: String },

    #[error("inline model {model} of {name} has bad headnode")]
    BadHeadnode { name: String, model: usize },

    #[error("consecutive calls to LM_AllocBlock({width},{height}) failed")]
    LightmapTooLarge { width: i32, height: i32 },

    #[error("MAX_LIGHTMAPS exceeded")]
    TooManyLightmaps,

    #[error("too many map tiles")]
    TooManyTiles,

    #[error("invalid positions")]
    InvalidPositions,

    #[error("invalid tile names")]
    InvalidTileNames,
}

#[derive(Debug, Error, PartialEq)]
pub enum LightmapError {
    #[error("consecutive calls to LM_AllocBlock({width},{height}) failed (dynamic: {dynamic})")]
    AllocationExhausted { width: i32, height: i32, dynamic: bool },
}
