//! End-to-end playback scenarios over the capture backend.

use approx::assert_relative_eq;
use opl3::registers;
use opl3::RegisterCapture;
use opl3_tracker_replayer::{ArpeggioScript, Module, TrackCell, TrackerEngine};

fn module_with(orders: usize, rows: usize, channels: usize) -> Module {
    let mut module = Module::new();
    module.allocate_order(orders).unwrap();
    module.allocate_patterns(1, rows, channels).unwrap();
    module.allocate_instruments(2).unwrap();
    module.build_default_track_index();
    module
}

fn engine(module: Module) -> TrackerEngine<RegisterCapture> {
    TrackerEngine::new(module, RegisterCapture::new()).unwrap()
}

/// One order entry, an empty pattern, one channel, speed 6: six ticks
/// produce exactly one row advance, and the single order entry wraps
/// to the restart position with song-end reported once.
#[test]
fn empty_pattern_advances_once_per_speed_ticks() {
    let module = module_with(1, 64, 1);
    let mut player = engine(module);

    for tick in 0..6 {
        assert!(player.tick(), "ended early on tick {tick}");
    }
    assert_eq!(player.current_row(), 1, "exactly one row advance expected");
    assert!(!player.song_ended());

    let mut safety = 0;
    while player.tick() {
        safety += 1;
        assert!(safety < 64 * 6 + 12, "song end never reported");
    }
    assert!(player.song_ended());
    assert_eq!(player.current_order(), 0, "wrapped to the restart position");
}

/// A cell with a note, an instrument and a max set-volume command: the
/// volume clamps to 63 and its register write precedes any frequency
/// write from the same row.
#[test]
fn set_volume_row_writes_volume_before_frequency() {
    let mut module = module_with(1, 64, 1);
    *module.cell_mut(1, 0) = TrackCell {
        note: 60,
        instrument: 1,
        command: 0x0C,
        param1: 0x3F,
        param2: 0,
    };
    let mut player = engine(module);
    player.backend_mut().clear();
    player.tick();

    assert_eq!(player.channel(0).unwrap().vol_carrier, 63);
    assert_eq!(player.channel(0).unwrap().vol_modulator, 63);

    let writes = player.backend().writes();
    let first_volume = writes
        .iter()
        .position(|w| {
            w.register == registers::OP_LEVEL
                || w.register == registers::OP_LEVEL + registers::CARRIER
        })
        .expect("a volume write must be issued");
    let first_frequency = writes
        .iter()
        .position(|w| {
            w.register == registers::CH_FREQUENCY || w.register == registers::CH_KEY_BLOCK
        })
        .expect("a frequency write must be issued");
    assert!(
        first_volume < first_frequency,
        "volume write at {first_volume} must precede frequency write at {first_frequency}"
    );
}

/// Tone portamento toward a target two octaves up: the combined
/// frequency+octave metric approaches the target monotonically and
/// never overshoots.
#[test]
fn tone_portamento_converges_without_overshoot() {
    let mut module = module_with(1, 64, 1);
    module.cell_mut(1, 0).note = 25;
    module.cell_mut(1, 0).instrument = 1;
    module.cell_mut(1, 1).note = 49; // two octaves above
    module.cell_mut(1, 1).command = 0x03;
    module.cell_mut(1, 1).param2 = 8;
    for row in 2..64 {
        // keep the portamento armed; empty parameters reuse the step
        module.cell_mut(1, row).command = 0x03;
    }
    let mut player = engine(module);
    for _ in 0..7 {
        player.tick();
    }

    let target = {
        let ch = player.channel(0).unwrap();
        (ch.next_freq as i32) + ((ch.next_octave as i32) << 10)
    };
    let metric = |player: &TrackerEngine<RegisterCapture>| {
        let ch = player.channel(0).unwrap();
        (ch.freq as i32) + ((ch.octave as i32) << 10)
    };

    let mut previous_distance = (target - metric(&player)).abs();
    assert!(previous_distance > 0);
    for _ in 0..370 {
        player.tick();
        let current = metric(&player);
        assert!(current <= target, "portamento overshot the target");
        let distance = (target - current).abs();
        assert!(distance <= previous_distance, "distance must not grow");
        previous_distance = distance;
    }
    assert_eq!(metric(&player), target, "portamento must land on the target");
}

/// A looping special-arpeggio script settles on one note and executes
/// exactly one opcode per tick, without runaway.
#[test]
fn special_arpeggio_loop_holds_a_note() {
    let mut module = module_with(1, 64, 1);
    let mut script = ArpeggioScript::default();
    script.list[0] = 100; // absolute note
    script.commands[0] = 0;
    script.list[1] = 254; // loop target: the zero tail of the pool
    script.commands[1] = 254;
    module.set_arpeggio_script(script);
    {
        let inst = module.instrument_mut(0).unwrap();
        inst.arp_start = 0;
        inst.arp_speed = 1;
    }
    module.cell_mut(1, 0).note = 60;
    module.cell_mut(1, 0).instrument = 1;

    let mut player = engine(module);
    for _ in 0..5 {
        player.tick();
    }

    let held = {
        let ch = player.channel(0).unwrap();
        (ch.freq, ch.octave)
    };
    for _ in 0..200 {
        player.tick();
        let ch = player.channel(0).unwrap();
        assert_eq!((ch.freq, ch.octave), held, "script must hold the note");
    }
    // The pointer parked in the zero-filled tail of the pool.
    assert_eq!(player.channel(0).unwrap().arp_pos, 255);
}

/// Volumes stay inside [0, 63] under any volume-slide sequence.
#[test]
fn volume_slides_stay_in_bounds() {
    let mut module = module_with(1, 64, 1);
    module.cell_mut(1, 0).note = 49;
    module.cell_mut(1, 0).instrument = 1;
    module.cell_mut(1, 0).command = 0x0C;
    module.cell_mut(1, 0).param2 = 0xC; // start near the top
    for row in 1..32 {
        module.cell_mut(1, row).command = 0x0A;
        module.cell_mut(1, row).param1 = 9; // slide up
    }
    for row in 32..64 {
        module.cell_mut(1, row).command = 0x0A;
        module.cell_mut(1, row).param2 = 9; // slide down
    }
    let mut player = engine(module);

    let mut reached_top = false;
    let mut reached_bottom = false;
    for _ in 0..(64 * 6) {
        player.tick();
        let ch = player.channel(0).unwrap();
        assert!(ch.vol_carrier <= 63);
        assert!(ch.vol_modulator <= 63);
        reached_top |= ch.vol_carrier == 63;
        reached_bottom |= ch.vol_carrier == 0;
    }
    assert!(reached_top, "slide up must saturate at 63");
    assert!(reached_bottom, "slide down must saturate at 0");
}

/// Octaves stay inside [0, 7] and frequencies inside the fold bounds
/// under sustained slides in both directions.
#[test]
fn frequency_slides_respect_fold_bounds() {
    let mut module = module_with(1, 64, 1);
    module.cell_mut(1, 0).note = 49;
    module.cell_mut(1, 0).instrument = 1;
    for row in 1..32 {
        module.cell_mut(1, row).command = 0x01;
        module.cell_mut(1, row).param1 = 3; // 0x30 per tick, up
    }
    for row in 32..64 {
        module.cell_mut(1, row).command = 0x02;
        module.cell_mut(1, row).param1 = 3; // down
    }
    let mut player = engine(module);
    player.tick(); // note-on row

    for _ in 0..(64 * 6 - 1) {
        player.tick();
        let ch = player.channel(0).unwrap();
        assert!(ch.octave <= 7);
        assert!(ch.freq < 686, "frequency must stay below the fold bound");
        assert!(ch.freq >= 342, "frequency must stay above the fold bound");
    }
    // The downward half must have pinned the channel to the bottom.
    let ch = player.channel(0).unwrap();
    assert_eq!(ch.octave, 0);
    assert_eq!(ch.freq, 342);
}

/// Refresh rate derives from the tempo unless the dialect fixes it.
#[test]
fn refresh_rate_follows_tempo_and_overrides() {
    let module = module_with(1, 64, 1);
    let player = engine(module);
    assert_relative_eq!(player.refresh_rate(), 50.0f32);

    let mut module = module_with(1, 64, 1);
    module.cell_mut(1, 0).command = 0x07; // set tempo 75
    module.cell_mut(1, 0).param1 = 4;
    module.cell_mut(1, 0).param2 = 0xB;
    let mut player = engine(module);
    player.tick();
    assert_relative_eq!(player.refresh_rate(), 30.0f32);

    let mut module = module_with(1, 64, 1);
    module.refresh_override = Some(18.2);
    let player = engine(module);
    assert_relative_eq!(player.refresh_rate(), 18.2f32);
}
