/// Map size used when no layout or params override it.
pub const DEFAULT_WORLD_WIDTH: i32 = 32;
pub const DEFAULT_WORLD_HEIGHT: i32 = 24;

/// Booking BFS iterations after which a warning is logged.
pub const ROUTING_SOFT_ITERATION_LIMIT: usize = 256;
/// Booking BFS iterations that count as a hang.
pub const ROUTING_HARD_ITERATION_LIMIT: usize = 10 * ROUTING_SOFT_ITERATION_LIMIT;

/// Segment-builder queues are sized `tiles * QUEUES_SCALE`.
pub const QUEUES_SCALE: usize = 4;

/// Total bytes the scratch arena may lease out at once.
pub const SCRATCH_CAPACITY_BYTES: usize = 64 * 1024 * 1024;

/// Fixed simulation rate of the bevy integration.
pub const SIMULATION_HZ: f64 = 60.0;

/// Player that owns everything placed through the public API.
pub const DEFAULT_PLAYER_ID: u8 = 0;
