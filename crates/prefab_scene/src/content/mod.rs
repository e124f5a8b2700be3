mod defs;
mod store;
mod template;

pub use defs::{
    load_prefab_defs, parse_prefab_defs, PrefabDefError, PrefabDefErrorCode, SourceLocation,
};
pub use store::{PrefabStore, PrefabStoreError};
pub use template::PrefabTemplate;
