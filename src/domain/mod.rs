pub mod appeal;
pub mod blacklist;
pub mod category;
pub mod effect;
pub mod settings;
pub mod strike;
