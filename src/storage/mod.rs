mod dir;

pub use dir::Dir;
