//! Renderer scenarios: scheduling gates, delay timing, and the pan law
//! observed at the destination.

use resona_engine::{AudioEngine, BlockBuffer, EngineConfig, DESTINATION_ID};

fn render_blocks(engine: &AudioEngine, block: usize, count: usize) -> (Vec<f32>, Vec<f32>) {
    let mut out = BlockBuffer::stereo(block);
    let mut left = Vec::with_capacity(count * block);
    let mut right = Vec::with_capacity(count * block);
    for _ in 0..count {
        engine.render(&mut out);
        left.extend_from_slice(out.channel(0));
        right.extend_from_slice(out.channel(1));
    }
    (left, right)
}

fn add_impulse_source(engine: &AudioEngine, sample_rate: u32) -> i32 {
    let source = engine.create_buffer_source();
    engine.buffer_source_set_buffer(source, &[1.0, 0.0, 0.0, 0.0], 4, 1, sample_rate);
    engine.param_set(source, "decay", 1.0e9);
    engine.buffer_source_start(source, 0.0);
    source
}

#[test]
fn oscillator_is_gated_by_start_and_stop_times() {
    const SR: f64 = 44_100.0;
    const BLOCK: usize = 147;
    let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");
    let osc = engine.create_oscillator();
    engine.oscillator_set_type(osc, 0);
    engine.param_set(osc, "frequency", 1_000.0);
    engine.oscillator_start(osc, 0.5);
    engine.oscillator_stop(osc, 1.0);
    engine.connect(osc, DESTINATION_ID, 0, 0);
    engine.resume();

    // Two seconds: 600 blocks of 147 samples.
    let (left, _) = render_blocks(&engine, BLOCK, 600);

    assert!(left[..22_050].iter().all(|v| *v == 0.0));
    let active = &left[22_050..44_100];
    let energy: f32 = active.iter().map(|v| v * v).sum::<f32>() / active.len() as f32;
    assert!(energy > 0.1, "window rms^2 {energy}");
    assert!(left[44_100..].iter().all(|v| *v == 0.0));
}

#[test]
fn delay_moves_an_impulse_by_its_delay_time() {
    const SR: f64 = 48_000.0;
    const BLOCK: usize = 128;
    let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");
    let source = add_impulse_source(&engine, SR as u32);
    let delay = engine.create_delay(1.0);
    engine.param_set(delay, "delayTime", 0.25);
    engine.param_set(delay, "feedback", 0.0);
    engine.connect(source, delay, 0, 0);
    engine.connect(delay, DESTINATION_ID, 0, 0);
    engine.resume();

    let (left, _) = render_blocks(&engine, BLOCK, 48_000 / BLOCK);

    assert!((left[12_000] - 1.0).abs() < 1e-3, "peak {}", left[12_000]);
    assert!(left[11_999].abs() < 1e-3);
    assert!(left[12_001].abs() < 1e-3);
    let residue: f32 = left
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 12_000)
        .map(|(_, v)| v.abs())
        .fold(0.0, f32::max);
    assert!(residue < 1e-3, "stray output {residue}");
}

#[test]
fn automated_delay_time_is_read_per_sample() {
    const SR: f64 = 48_000.0;
    const BLOCK: usize = 128;
    let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");
    let source = add_impulse_source(&engine, SR as u32);
    let delay = engine.create_delay(1.0);
    engine.param_set(delay, "delayTime", 0.1);
    // Schedule far-future motion so the block is automated but the early
    // values stay at 0.1 s.
    engine.param_linear_ramp(delay, "delayTime", 0.2, 100.0);
    engine.connect(source, delay, 0, 0);
    engine.connect(delay, DESTINATION_ID, 0, 0);
    engine.resume();

    let (left, _) = render_blocks(&engine, BLOCK, 9_600 / BLOCK);
    let peak = left
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(i, _)| i)
        .unwrap();
    // 0.1 s at 48 kHz plus a 0.001 s/s ramp: the echo lands near 4805.
    assert!((peak as i64 - 4_805).unsigned_abs() <= 8, "peak at {peak}");
}

#[test]
fn panner_center_is_equal_power() {
    const SR: f64 = 48_000.0;
    const BLOCK: usize = 128;
    let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");

    let source = engine.create_buffer_source();
    engine.buffer_source_set_buffer(source, &[1.0; 4_800], 4_800, 1, SR as u32);
    engine.buffer_source_set_loop(source, true);
    engine.param_set(source, "decay", 1.0e9);
    engine.buffer_source_start(source, 0.0);

    let panner = engine.create_stereo_panner();
    engine.param_set(panner, "pan", 0.0);
    engine.connect(source, panner, 0, 0);
    engine.connect(panner, DESTINATION_ID, 0, 0);
    engine.resume();

    let (left, right) = render_blocks(&engine, BLOCK, 4);
    let expected = std::f32::consts::FRAC_PI_4.cos();
    for i in 0..left.len() {
        assert!((left[i] - expected).abs() < 1e-4, "left[{i}] = {}", left[i]);
        assert!((right[i] - expected).abs() < 1e-4, "right[{i}] = {}", right[i]);
    }
}

#[test]
fn waveshaper_clips_through_its_curve() {
    const SR: f64 = 48_000.0;
    const BLOCK: usize = 64;
    let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");

    let osc = engine.create_oscillator();
    engine.oscillator_set_type(osc, 1);
    engine.oscillator_start(osc, 0.0);
    let shaper = engine.create_wave_shaper();
    engine
        .wave_shaper_set_curve(shaper, &[-0.5, 0.0, 0.5])
        .expect("curve");
    engine.connect(osc, shaper, 0, 0);
    engine.connect(shaper, DESTINATION_ID, 0, 0);
    engine.resume();

    let (left, _) = render_blocks(&engine, BLOCK, 2);
    assert!(left.iter().all(|v| v.abs() <= 0.5 + 1e-6));
    assert!(left.iter().any(|v| (v.abs() - 0.5).abs() < 1e-6));
}

#[test]
fn analyzer_observes_the_signal_path() {
    const SR: f64 = 48_000.0;
    const BLOCK: usize = 128;
    let engine = AudioEngine::new(EngineConfig::new(SR, BLOCK)).expect("engine");

    let osc = engine.create_oscillator();
    engine.oscillator_set_type(osc, 0);
    // Bin 32 of a 1024-point transform at 48 kHz.
    engine.param_set(osc, "frequency", 1_500.0);
    engine.oscillator_start(osc, 0.0);
    let analyzer = engine.create_analyzer();
    engine.analyzer_set_fft_size(analyzer, 1_024).expect("fft size");
    engine.connect(osc, analyzer, 0, 0);
    engine.connect(analyzer, DESTINATION_ID, 0, 0);
    engine.resume();

    let _ = render_blocks(&engine, BLOCK, 16);

    let mut spectrum = vec![0.0f32; 512];
    engine.analyzer_float_frequency_data(analyzer, &mut spectrum);
    let peak = spectrum
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(peak, 32);
}
