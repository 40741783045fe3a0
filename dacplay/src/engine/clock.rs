//! The sample clock: the periodic consumer that drains the active buffer into
//! the output sink, and the drivers that tick it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::session::SharedState;
use crate::io::OutputSink;

/// Maps signed samples onto the unsigned range of the output sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputScaler {
    gain_q8: i32,
    max: u32,
}

impl OutputScaler {
    pub fn new(gain_q8: u16, dac_bits: u8) -> Self {
        Self {
            gain_q8: gain_q8 as i32,
            max: (1u32 << dac_bits.clamp(1, 16)) - 1,
        }
    }

    pub fn max(&self) -> u16 {
        self.max as u16
    }

    /// Mid-scale output value.
    #[inline]
    pub fn silence(&self) -> u16 {
        ((self.max + 1) / 2) as u16
    }

    /// Applies the fixed gain with saturation, then volume, then maps into
    /// `0..=max`.
    #[inline]
    pub fn scale(&self, sample: i16, volume: u8) -> u16 {
        let gained = ((sample as i32 * self.gain_q8) >> 8).clamp(i16::MIN as i32, i16::MAX as i32);
        let attenuated = gained * volume.min(100) as i32 / 100;
        let unsigned = (attenuated + 32768) as u64;
        ((unsigned * (self.max as u64 + 1)) >> 16).min(self.max as u64) as u16
    }
}

/// One consumer tick's worth of logic.
///
/// `tick` is O(1) and never blocks, allocates, logs or fails; every abnormal
/// condition degrades to a silence sample.
#[derive(Debug, Clone)]
pub struct SampleClock {
    shared: Arc<SharedState>,
    scaler: OutputScaler,
}

impl SampleClock {
    pub fn new(shared: Arc<SharedState>, scaler: OutputScaler) -> Self {
        Self { shared, scaler }
    }

    pub fn scaler(&self) -> OutputScaler {
        self.scaler
    }

    /// Computes the next output value, advancing the buffer cursor.
    #[inline]
    pub fn next_value(&self) -> u16 {
        let shared = &*self.shared;
        if !shared.is_playing() || shared.is_paused() {
            return self.scaler.silence();
        }
        match shared.pool().next_frame() {
            Some(sample) => {
                shared.record_consumed();
                self.scaler.scale(sample, shared.volume())
            }
            None => {
                shared.record_underrun();
                self.scaler.silence()
            }
        }
    }

    #[inline]
    pub fn tick<K: OutputSink + ?Sized>(&self, sink: &mut K) {
        sink.write_sample(self.next_value());
    }
}

/// Starts and stops the periodic consumer.
///
/// `disable` must not return while a tick is in flight, so the caller may
/// mutate consumer-visible state right after it.
pub trait ClockDriver {
    fn set_sample_rate(&mut self, hz: u32);

    fn enable(&mut self);

    fn disable(&mut self);

    fn is_enabled(&self) -> bool;

    /// Writes one silence sample directly to the sink.
    fn write_silence(&mut self);
}

/// A clock ticked explicitly by its owner; deterministic.
pub struct ManualClock<K> {
    clock: SampleClock,
    sink: K,
    enabled: bool,
    sample_rate: u32,
}

impl<K: OutputSink> ManualClock<K> {
    pub fn new(clock: SampleClock, sink: K) -> Self {
        Self {
            clock,
            sink,
            enabled: false,
            sample_rate: 0,
        }
    }

    /// Runs one tick if enabled; returns whether it ran.
    pub fn tick(&mut self) -> bool {
        if self.enabled {
            self.clock.tick(&mut self.sink);
        }
        self.enabled
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn period(&self) -> Option<Duration> {
        (self.sample_rate > 0).then(|| Duration::from_secs(1) / self.sample_rate)
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }
}

impl<K: OutputSink> ClockDriver for ManualClock<K> {
    fn set_sample_rate(&mut self, hz: u32) {
        self.sample_rate = hz;
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn write_silence(&mut self) {
        let silence = self.clock.scaler().silence();
        self.sink.write_sample(silence);
    }
}

#[derive(Debug, Default)]
struct ClockControl {
    enabled: AtomicBool,
    in_tick: AtomicBool,
    shutdown: AtomicBool,
    sample_rate: AtomicU32,
}

/// A clock running the consumer on a dedicated thread, paced by deadline at
/// the configured sample period.
///
/// The sink lives behind a mutex so the owner can inspect it; the clock
/// thread only ever `try_lock`s it and emits nothing on contention.
pub struct ThreadedClock<K> {
    control: Arc<ClockControl>,
    sink: Arc<Mutex<K>>,
    silence: u16,
    worker: Option<JoinHandle<()>>,
}

impl<K: OutputSink + Send + 'static> ThreadedClock<K> {
    pub fn spawn(clock: SampleClock, sink: K) -> std::io::Result<Self> {
        let control = Arc::new(ClockControl::default());
        let sink = Arc::new(Mutex::new(sink));
        let silence = clock.scaler().silence();

        let worker = thread::Builder::new().name("sample-clock".into()).spawn({
            let control = Arc::clone(&control);
            let sink = Arc::clone(&sink);
            move || run_clock(clock, &control, &sink)
        })?;

        Ok(Self {
            control,
            sink,
            silence,
            worker: Some(worker),
        })
    }

    pub fn sink(&self) -> &Arc<Mutex<K>> {
        &self.sink
    }
}

fn run_clock<K: OutputSink>(clock: SampleClock, control: &ClockControl, sink: &Mutex<K>) {
    let mut deadline = Instant::now();
    while !control.shutdown.load(Ordering::SeqCst) {
        let rate = control.sample_rate.load(Ordering::Relaxed);
        control.in_tick.store(true, Ordering::SeqCst);
        if rate == 0 || !control.enabled.load(Ordering::SeqCst) {
            control.in_tick.store(false, Ordering::SeqCst);
            thread::park_timeout(Duration::from_millis(5));
            deadline = Instant::now();
            continue;
        }
        if let Ok(mut sink) = sink.try_lock() {
            clock.tick(&mut *sink);
        }
        control.in_tick.store(false, Ordering::SeqCst);

        deadline += Duration::from_secs(1) / rate;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else if now - deadline > Duration::from_millis(100) {
            // Too far behind to catch up sample by sample.
            deadline = now;
        }
    }
}

impl<K: OutputSink> ClockDriver for ThreadedClock<K> {
    fn set_sample_rate(&mut self, hz: u32) {
        self.control.sample_rate.store(hz, Ordering::Relaxed);
    }

    fn enable(&mut self) {
        self.control.enabled.store(true, Ordering::SeqCst);
        if let Some(worker) = &self.worker {
            worker.thread().unpark();
        }
    }

    fn disable(&mut self) {
        self.control.enabled.store(false, Ordering::SeqCst);
        while self.control.in_tick.load(Ordering::SeqCst) {
            std::hint::spin_loop();
        }
    }

    fn is_enabled(&self) -> bool {
        self.control.enabled.load(Ordering::SeqCst)
    }

    fn write_silence(&mut self) {
        if let Ok(mut sink) = self.sink.lock() {
            sink.write_sample(self.silence);
        }
    }
}

impl<K> Drop for ThreadedClock<K> {
    fn drop(&mut self) {
        self.control.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn clock() -> (Arc<SharedState>, SampleClock) {
        let config = EngineConfig {
            buffer_samples: 4,
            volume: 100,
            ..Default::default()
        };
        let shared = Arc::new(SharedState::new(&config));
        let clock = SampleClock::new(Arc::clone(&shared), OutputScaler::new(256, 10));
        (shared, clock)
    }

    #[test]
    fn scaler_maps_to_dac_range() {
        let scaler = OutputScaler::new(256, 10);
        assert_eq!(scaler.silence(), 512);
        assert_eq!(scaler.scale(0, 100), 512);
        assert_eq!(scaler.scale(i16::MIN, 100), 0);
        assert_eq!(scaler.scale(i16::MAX, 100), 1023);
        assert_eq!(scaler.scale(i16::MAX, 0), 512);
        assert_eq!(scaler.scale(i16::MIN, 50), 256);
    }

    #[test]
    fn gain_saturates() {
        let scaler = OutputScaler::new(512, 10);
        assert_eq!(scaler.scale(20_000, 100), 1023);
        assert_eq!(scaler.scale(-20_000, 100), 0);
        assert_eq!(
            scaler.scale(8192, 100),
            OutputScaler::new(256, 10).scale(16_384, 100)
        );
    }

    #[test]
    fn volume_is_monotonic() {
        let scaler = OutputScaler::new(256, 10);
        for sample in [-32768i16, -1000, -1, 1, 1000, 32767] {
            let mut previous = 0;
            for volume in 0..=100 {
                let distance = scaler.scale(sample, volume).abs_diff(512);
                assert!(distance >= previous, "sample {sample} volume {volume}");
                previous = distance;
            }
        }
    }

    #[test]
    fn stopped_or_paused_emits_silence_without_reading() {
        let (shared, clock) = clock();
        shared.pool().publish(0, &[1000, 1000]);

        let mut out = Vec::<u16>::new();
        clock.tick(&mut out);
        shared.set_transport(true, true);
        clock.tick(&mut out);
        assert_eq!(out, [512, 512]);
        assert_eq!(shared.pool().position(), 0);
        assert_eq!(shared.stats().consumed, 0);
    }

    #[test]
    fn manual_clock_ticks_only_when_enabled() {
        let (shared, clock) = clock();
        shared.pool().publish(0, &[i16::MAX]);
        shared.set_transport(true, false);

        let mut manual = ManualClock::new(clock, Vec::<u16>::new());
        assert!(!manual.tick());
        manual.set_sample_rate(8000);
        manual.enable();
        assert!(manual.tick());
        assert!(manual.tick());
        manual.write_silence();
        assert_eq!(manual.sink(), &[1023, 512, 512]);
        assert_eq!(manual.period(), Some(Duration::from_micros(125)));
        assert_eq!(
            shared.stats(),
            crate::engine::session::ClockStats {
                consumed: 1,
                underruns: 1
            }
        );
    }

    #[test]
    fn threaded_clock_drains_and_stops() -> std::io::Result<()> {
        let (shared, clock) = clock();
        shared.pool().publish(0, &[0, 0, 0, 0]);
        shared.set_transport(true, false);

        let mut threaded = ThreadedClock::spawn(clock, Vec::<u16>::new())?;
        threaded.set_sample_rate(8000);
        threaded.enable();
        let started = Instant::now();
        while shared.stats().consumed < 4 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }
        threaded.disable();
        assert!(!threaded.is_enabled());

        let written = threaded.sink().lock().map(|sink| sink.len()).unwrap_or(0);
        thread::sleep(Duration::from_millis(20));
        let after = threaded.sink().lock().map(|sink| sink.len()).unwrap_or(0);
        assert_eq!(written, after);
        assert_eq!(shared.stats().consumed, 4);
        Ok(())
    }
}
