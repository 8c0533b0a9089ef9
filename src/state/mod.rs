pub mod app_settings;
pub mod bus;
pub mod cache;
pub mod desk;
pub mod draft;
pub mod editor;
pub mod error;
pub mod generator;
pub mod progression;
pub mod reconcile;
pub mod refresher;
pub mod reset;

#[cfg(test)]
pub(crate) mod test_support;
