//! Two-phase frame scheduling.
//!
//! Prepare runs synchronously on the caller (control) thread and produces a [`FrameProxy`].
//! Render runs on one dedicated worker thread that only ever sees proxies. Every request gets a
//! strictly increasing generation; issuing one supersedes whatever is queued or in flight.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::assets::store::ResourceStore;
use crate::foundation::core::{FrameIndex, IntRect};
use crate::foundation::error::{MontageError, MontageResult};
use crate::render::frame::{CancelToken, FrameRenderer};
use crate::render::proxy::FrameProxy;
use crate::render::scratch::ScratchPoolOpts;
use crate::render::surface::Surface;
use crate::timeline::timeline::Timeline;

/// Options controlling [`RenderManager`] scheduling.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderManagerOpts {
    /// Render tracks in parallel (rayon), each into its own layer.
    pub parallel_tracks: bool,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Minimum spacing between dispatches from [`RenderManager::tick`]. 0 disables the limit.
    pub min_dispatch_interval_ms: u64,
    /// Finished frames buffered for the UI before the worker waits for it to catch up.
    pub channel_capacity: usize,
    /// Render durations kept for [`RenderStats::average_render_ms`].
    pub keep_render_time_samples: usize,
}

impl Default for RenderManagerOpts {
    fn default() -> Self {
        Self {
            parallel_tracks: false,
            threads: None,
            min_dispatch_interval_ms: 0,
            channel_capacity: 4,
            keep_render_time_samples: 32,
        }
    }
}

/// Where the most recent request is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Preparing,
    Rendering,
    Assembling,
    Published,
    Cancelled,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    pub prepared: u64,
    pub dispatched: u64,
    pub published: u64,
    /// Requests superseded before or during rendering.
    pub cancelled: u64,
    pub clip_failures: u64,
    pub skipped_clips: u64,
    pub average_render_ms: f64,
}

/// "Frame rendered" notification.
#[derive(Clone, Debug)]
pub struct RenderedFrame {
    /// Generation of the request that produced this frame.
    pub request: u64,
    pub frame: FrameIndex,
    pub surface: Arc<Surface>,
    pub dirty: IntRect,
}

struct Job {
    token: CancelToken,
    proxy: FrameProxy,
}

#[derive(Default)]
struct StatsState {
    stats: RenderStats,
    samples: VecDeque<f64>,
}

struct Shared {
    /// Generation the phase describes, and that request's phase.
    phase: Mutex<(u64, RenderPhase)>,
    stats: Mutex<StatsState>,
    /// Jobs sent but not yet finished by the worker.
    pending: Mutex<usize>,
    idle: Condvar,
    published: AtomicU64,
    keep_samples: usize,
}

impl Shared {
    /// Make `generation` the request `state()` reports on.
    fn begin_request(&self, generation: u64, phase: RenderPhase) {
        *self.phase.lock() = (generation, phase);
    }

    /// Ignored unless `generation` is the request currently reported.
    fn set_phase(&self, generation: u64, phase: RenderPhase) {
        let mut current = self.phase.lock();
        if current.0 == generation {
            current.1 = phase;
        }
    }

    fn count(&self, f: impl FnOnce(&mut RenderStats)) {
        f(&mut self.stats.lock().stats);
    }

    fn record_render_time(&self, ms: f64) {
        let mut st = self.stats.lock();
        if self.keep_samples == 0 {
            return;
        }
        if st.samples.len() == self.keep_samples {
            st.samples.pop_front();
        }
        st.samples.push_back(ms);
        st.stats.average_render_ms = st.samples.iter().sum::<f64>() / st.samples.len() as f64;
    }

    fn finish_job(&self) {
        let mut pending = self.pending.lock();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Schedules prepare/render cycles for a timeline and announces finished frames.
pub struct RenderManager {
    store: Arc<ResourceStore>,
    opts: RenderManagerOpts,
    latest: Arc<AtomicU64>,
    shared: Arc<Shared>,
    job_tx: Option<mpsc::Sender<Job>>,
    frame_rx: mpsc::Receiver<RenderedFrame>,
    worker: Option<JoinHandle<()>>,
    last_dispatch: Option<Instant>,
}

impl RenderManager {
    pub fn new(
        opts: RenderManagerOpts,
        scratch: ScratchPoolOpts,
        store: Arc<ResourceStore>,
    ) -> MontageResult<Self> {
        let renderer = if opts.parallel_tracks {
            FrameRenderer::parallel(opts.threads, scratch)?
        } else {
            FrameRenderer::sequential(scratch)
        };

        let shared = Arc::new(Shared {
            phase: Mutex::new((0, RenderPhase::Idle)),
            stats: Mutex::new(StatsState::default()),
            pending: Mutex::new(0),
            idle: Condvar::new(),
            published: AtomicU64::new(0),
            keep_samples: opts.keep_render_time_samples,
        });
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (frame_tx, frame_rx) = mpsc::sync_channel::<RenderedFrame>(opts.channel_capacity.max(1));

        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("montage-render".to_owned())
                .spawn(move || worker_loop(job_rx, frame_tx, shared, renderer))
                .map_err(|e| MontageError::render(format!("failed to spawn render worker: {e}")))?
        };

        Ok(Self {
            store,
            opts,
            latest: Arc::new(AtomicU64::new(0)),
            shared,
            job_tx: Some(job_tx),
            frame_rx,
            worker: Some(worker),
            last_dispatch: None,
        })
    }

    pub fn opts(&self) -> &RenderManagerOpts {
        &self.opts
    }

    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// Phase of the newest request.
    pub fn state(&self) -> RenderPhase {
        self.shared.phase.lock().1
    }

    pub fn stats(&self) -> RenderStats {
        self.shared.stats.lock().stats.clone()
    }

    /// Generation of the newest request issued so far.
    pub fn latest_request(&self) -> u64 {
        self.latest.load(Ordering::Acquire)
    }

    /// Jobs dispatched and not yet finished or discarded by the worker.
    pub fn pending(&self) -> usize {
        *self.shared.pending.lock()
    }

    /// Render the play head if the model changed since the last dispatch.
    ///
    /// Returns the request generation when a render was dispatched. Suspension and the
    /// dispatch interval defer the render and keep the timeline dirty.
    pub fn tick(&mut self, timeline: &mut Timeline) -> MontageResult<Option<u64>> {
        let notifier = timeline.notifier();
        if notifier.is_suspended() || !notifier.is_dirty() {
            return Ok(None);
        }
        if self.opts.min_dispatch_interval_ms > 0
            && let Some(last) = self.last_dispatch
            && last.elapsed() < Duration::from_millis(self.opts.min_dispatch_interval_ms)
        {
            tracing::debug!("dispatch deferred by interval");
            return Ok(None);
        }
        if !notifier.take_dirty() {
            return Ok(None);
        }
        let frame = timeline.play_head();
        self.request_frame(timeline, frame).map(Some)
    }

    /// Prepare `frame` now and hand it to the worker, superseding any earlier request.
    pub fn request_frame(&mut self, timeline: &mut Timeline, frame: FrameIndex) -> MontageResult<u64> {
        let max = timeline.max_duration();
        if frame.0 >= max {
            return Err(MontageError::validation(format!(
                "frame {} is outside the timeline duration {max}",
                frame.0
            )));
        }
        let Some(job_tx) = &self.job_tx else {
            return Err(MontageError::render("render worker has shut down"));
        };

        // Allocating the generation first supersedes the in-flight render while this one prepares.
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.begin_request(generation, RenderPhase::Preparing);
        timeline.update_automation(timeline.play_head());
        let proxy = timeline.prepare(frame, &self.store);
        self.shared.count(|s| {
            s.prepared += 1;
            s.skipped_clips += u64::from(proxy.skipped_clips);
        });

        let token = CancelToken::new(Arc::clone(&self.latest), generation);
        *self.shared.pending.lock() += 1;
        self.shared.set_phase(generation, RenderPhase::Rendering);
        if job_tx.send(Job { token, proxy }).is_err() {
            self.shared.finish_job();
            self.shared.set_phase(generation, RenderPhase::Idle);
            return Err(MontageError::render("render worker has shut down"));
        }
        self.shared.count(|s| s.dispatched += 1);
        self.last_dispatch = Some(Instant::now());
        tracing::debug!(generation, frame = frame.0, "frame dispatched");
        Ok(generation)
    }

    /// Newest finished frame, discarding older ones still queued.
    pub fn try_recv_frame(&self) -> Option<RenderedFrame> {
        let mut newest = None;
        while let Ok(f) = self.frame_rx.try_recv() {
            newest = Some(f);
        }
        newest
    }

    /// Wait up to `timeout` for a finished frame, then return the newest available.
    pub fn recv_frame_timeout(&self, timeout: Duration) -> Option<RenderedFrame> {
        let first = self.frame_rx.recv_timeout(timeout).ok()?;
        Some(self.try_recv_frame().unwrap_or(first))
    }

    /// Supersede everything queued or in flight and wait until the worker is idle.
    pub fn cancel_and_wait(&self) {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut phase = self.shared.phase.lock();
            if matches!(
                phase.1,
                RenderPhase::Preparing | RenderPhase::Rendering | RenderPhase::Assembling
            ) {
                *phase = (generation, RenderPhase::Cancelled);
            }
        }
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            self.shared.idle.wait(&mut pending);
        }
    }

    /// Wait until every dispatched job has finished, without cancelling.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.shared.pending.lock();
        while *pending > 0 {
            if self.shared.idle.wait_until(&mut pending, deadline).timed_out() {
                return *pending == 0;
            }
        }
        true
    }
}

impl Drop for RenderManager {
    fn drop(&mut self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
        self.job_tx.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("render worker panicked during shutdown");
        }
    }
}

impl std::fmt::Debug for RenderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderManager")
            .field("state", &self.state())
            .field("latest_request", &self.latest_request())
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn worker_loop(
    jobs: mpsc::Receiver<Job>,
    frames: mpsc::SyncSender<RenderedFrame>,
    shared: Arc<Shared>,
    mut renderer: FrameRenderer,
) {
    while let Ok(mut job) = jobs.recv() {
        // Only the newest queued job is worth rendering.
        while let Ok(newer) = jobs.try_recv() {
            discard(&shared, &job, "superseded in queue");
            job = newer;
        }
        run_job(&job, &frames, &shared, &mut renderer);
        shared.finish_job();
    }
}

fn discard(shared: &Shared, job: &Job, why: &'static str) {
    tracing::debug!(generation = job.token.generation(), why, "frame cancelled");
    shared.count(|s| s.cancelled += 1);
    shared.set_phase(job.token.generation(), RenderPhase::Cancelled);
    shared.finish_job();
}

#[tracing::instrument(skip_all, fields(generation = job.token.generation(), frame = job.proxy.frame.0))]
fn run_job(
    job: &Job,
    frames: &mpsc::SyncSender<RenderedFrame>,
    shared: &Shared,
    renderer: &mut FrameRenderer,
) {
    let generation = job.token.generation();
    if job.token.is_cancelled() {
        tracing::debug!(generation, "frame cancelled before render");
        shared.count(|s| s.cancelled += 1);
        shared.set_phase(generation, RenderPhase::Cancelled);
        return;
    }
    shared.set_phase(generation, RenderPhase::Rendering);

    let started = Instant::now();
    let rendered = catch_unwind(AssertUnwindSafe(|| renderer.render(&job.proxy, &job.token)));
    let outcome = match rendered {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            tracing::debug!(generation, "frame cancelled during render");
            shared.count(|s| s.cancelled += 1);
            shared.set_phase(generation, RenderPhase::Cancelled);
            return;
        }
        Err(_) => {
            tracing::error!(generation, "render worker panicked; frame dropped");
            shared.set_phase(generation, RenderPhase::Idle);
            return;
        }
    };
    shared.set_phase(generation, RenderPhase::Assembling);
    shared.record_render_time(started.elapsed().as_secs_f64() * 1000.0);
    shared.count(|s| s.clip_failures += u64::from(outcome.clip_failures));

    let mut msg = RenderedFrame {
        request: generation,
        frame: job.proxy.frame,
        surface: Arc::new(outcome.surface),
        dirty: outcome.dirty,
    };
    loop {
        if job.token.is_cancelled() || shared.published.load(Ordering::Acquire) >= generation {
            tracing::debug!(generation, "frame superseded before publish");
            shared.count(|s| s.cancelled += 1);
            shared.set_phase(generation, RenderPhase::Cancelled);
            return;
        }
        match frames.try_send(msg) {
            Ok(()) => break,
            Err(mpsc::TrySendError::Full(back)) => {
                // The UI is behind; wait for it unless a newer request arrives.
                msg = back;
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(mpsc::TrySendError::Disconnected(_)) => return,
        }
    }
    shared.published.store(generation, Ordering::Release);
    shared.count(|s| s.published += 1);
    shared.set_phase(generation, RenderPhase::Published);
    tracing::debug!(generation, "frame published");
}

#[cfg(test)]
#[path = "../../tests/unit/render/manager.rs"]
mod tests;
