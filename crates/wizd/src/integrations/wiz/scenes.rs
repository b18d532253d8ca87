//! Scene presets shared by every WiZ bulb.

/// Scene id the bulb uses for music-driven "Rhythm" mode. A pilot carrying it
/// must not carry any other light parameter.
pub const RHYTHM_SCENE_ID: u32 = 1000;

/// Every known scene, ordered by id.
pub static SCENES: &[(u32, &str)] = &[
    (1, "Ocean"),
    (2, "Romance"),
    (3, "Sunset"),
    (4, "Party"),
    (5, "Fireplace"),
    (6, "Cozy"),
    (7, "Forest"),
    (8, "Pastel Colors"),
    (9, "Wake up"),
    (10, "Bedtime"),
    (11, "Warm White"),
    (12, "Daylight"),
    (13, "Cool white"),
    (14, "Night light"),
    (15, "Focus"),
    (16, "Relax"),
    (17, "True colors"),
    (18, "TV time"),
    (19, "Plantgrowth"),
    (20, "Spring"),
    (21, "Summer"),
    (22, "Fall"),
    (23, "Deepdive"),
    (24, "Jungle"),
    (25, "Mojito"),
    (26, "Club"),
    (27, "Christmas"),
    (28, "Halloween"),
    (29, "Candlelight"),
    (30, "Golden white"),
    (31, "Pulse"),
    (32, "Steampunk"),
    (RHYTHM_SCENE_ID, "Rhythm"),
];

/// Models that only render part of the scene table. Entries are positions in
/// `SCENES`, not scene ids.
static MODEL_SCENE_POSITIONS: &[(&str, &[usize])] = &[
    // Filament bulb
    ("ESP56_SHTW3_01", &[8, 9, 14, 15, 17, 28, 29, 31]),
    // Filament bulb without white LEDs
    ("ESP06_SHDW9_01", &[8, 9, 13, 28, 30, 29, 31]),
    // Filament bulb ST64
    ("ESP06_SHDW1_01", &[8, 9, 13, 28, 29, 31]),
    (
        "ESP15_SHTW1_01I",
        &[5, 8, 9, 10, 11, 12, 13, 14, 15, 17, 28, 30, 29, 31],
    ),
];

pub fn scene_name(id: u32) -> Option<&'static str> {
    SCENES
        .iter()
        .find(|(scene_id, _)| *scene_id == id)
        .map(|(_, name)| *name)
}

pub fn scene_id(name: &str) -> Option<u32> {
    SCENES
        .iter()
        .find(|(_, scene_name)| *scene_name == name)
        .map(|(id, _)| *id)
}

/// Scene names a model can render, in display order.
///
/// Unmapped or unknown models get the full table.
pub fn effect_list(model: Option<&str>) -> Vec<&'static str> {
    let positions = model.and_then(|model| {
        MODEL_SCENE_POSITIONS
            .iter()
            .find(|(name, _)| *name == model)
            .map(|(_, positions)| *positions)
    });

    match positions {
        Some(positions) => positions
            .iter()
            .filter_map(|&pos| SCENES.get(pos).map(|(_, name)| *name))
            .collect(),
        None => SCENES.iter().map(|(_, name)| *name).collect(),
    }
}
