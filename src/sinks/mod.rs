#[cfg(test)]
pub mod collecting;
pub mod logging;
