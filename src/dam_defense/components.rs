use glam::Vec3;

pub const TAG_BOAT: &str = "Boat";
pub const TAG_BALL: &str = "Ball";

/// An attacking boat.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnemyComponent {
    /// Seconds until the boat may damage the dam again.
    pub cooldown: f32,
    pub alive: bool,
    pub model: usize,
    pub lane: usize,
}

impl EnemyComponent {
    pub fn new(model: usize, lane: usize) -> Self {
        Self { cooldown: 0.0, alive: true, model, lane }
    }
}

/// One of the birds circling over the river.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bird {
    pub offset: Vec3,
}

/// Flamethrower turret on the dam wall.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Flamethrower;
