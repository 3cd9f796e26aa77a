pub mod health;
pub mod leaks_ws;
pub mod positions;
