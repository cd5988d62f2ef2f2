use serde::{Deserialize, Serialize};

/**
 * Small interface that provides access to the physical location information about a cluster.
 * All values should be defaulted to -1 if unavailable. Tile should only allow
 * non-zero positive integers, x and y coordinates may be negative.
 */
pub trait PhysicalLocation {
    const NO_VALUE: i32 = -1;

    fn get_tile(&self) -> i16;

    fn set_tile(&mut self, tile: i16);

    fn get_x(&self) -> i32;

    fn set_x(&mut self, x: i32);

    fn get_y(&self) -> i32;

    fn set_y(&mut self, y: i32);

    /** Default implementation of a method to check whether real location data has been set. */
    fn has_location(&self) -> bool {
        self.get_tile() as i32 != Self::NO_VALUE
    }
}

/**
 * Tile plus x/y pixel coordinates of the sequencing cluster a read came from. The coordinates
 * are ints so they do not overflow within a large patterned-flowcell tile.
 */
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysicalLocationInt {
    pub tile: i16,
    pub x: i32,
    pub y: i32,
}

impl Default for PhysicalLocationInt {
    fn default() -> Self {
        Self {
            tile: -1,
            x: -1,
            y: -1,
        }
    }
}

impl PhysicalLocation for PhysicalLocationInt {
    fn get_tile(&self) -> i16 {
        self.tile
    }

    fn set_tile(&mut self, tile: i16) {
        self.tile = tile;
    }

    fn get_x(&self) -> i32 {
        self.x
    }

    fn set_x(&mut self, x: i32) {
        self.x = x;
    }

    fn get_y(&self) -> i32 {
        self.y
    }

    fn set_y(&mut self, y: i32) {
        self.y = y;
    }
}
