/*!
Side-channel hygiene for comparisons that involve derived key material.
*/

pub mod constant_time;

pub use constant_time::constant_time_eq;
