pub mod appeals;
pub mod blacklist;
pub mod categories;
pub mod error;
pub mod export;
pub mod lifecycle;
pub mod locks;
pub mod settings;
pub mod strikes;
