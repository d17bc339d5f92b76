pub mod db;
pub mod error;
pub mod geom;
pub mod timing;
pub mod util;
