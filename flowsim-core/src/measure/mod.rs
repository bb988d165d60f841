mod rate;

pub use self::rate::Rate;
