//! Concrete lifting cascades: W5X3, W9X7, and the general ATK kernel.
pub mod atk;
pub mod w5x3;
pub mod w9x7;
