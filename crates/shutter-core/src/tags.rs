/// Name of one observable bank quantity across the log, metric and audit
/// surfaces.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub key: &'static str,
    pub metric: &'static str,
    pub help: &'static str,
}

pub const SHUTTER_POSITION: Tag = Tag {
    key: "positions",
    metric: "shutter_position_ratio",
    help: "Shutter position (0 = fully up, 1 = fully down)",
};

pub const SHUTTERS_MOVING: Tag = Tag {
    key: "moving",
    metric: "shutter_moving_count",
    help: "Shutters currently moving",
};

pub const TICKS: Tag = Tag {
    key: "tick_count",
    metric: "shutter_ticks_total",
    help: "Simulation ticks executed",
};

pub const LOOP_ITERATIONS: Tag = Tag {
    key: "iterations",
    metric: "shutter_loop_iterations_total",
    help: "Input polling iterations executed",
};

pub const BROADCASTS: Tag = Tag {
    key: "broadcasts",
    metric: "shutter_broadcasts_total",
    help: "Long-press moves applied to the whole bank",
};

pub const STOPS: Tag = Tag {
    key: "stops",
    metric: "shutter_stops_total",
    help: "Moving shutters halted by pressing both controls",
};
