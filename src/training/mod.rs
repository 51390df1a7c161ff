mod driver;

pub use driver::Model;
