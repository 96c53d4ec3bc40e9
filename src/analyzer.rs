mod key;

pub use key::KeyDetector;
