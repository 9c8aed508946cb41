//! Tween scheduler: per-(target, property) channels and conflict resolution.
//!
//! Every pair has a channel holding a baseline value. Each frame the channel's
//! output is
//!
//! ```text
//! output = (governing absolute tween value, else baseline)
//!        + settled additive offset
//!        + sum over active additive tweens of (value - anchor)
//! ```
//!
//! where `anchor` is the baseline at the moment the additive tween was
//! scheduled. Finishing or cancelling a tween folds its contribution into the
//! baseline or the settled offset, so the output never jumps. Once the last
//! tween leaves a channel the offset is folded into the baseline, and a new
//! absolute tween starts from the output minus whatever additive tweens keep
//! contributing.

use std::cmp::Ordering;

use hashbrown::HashMap;
use indexmap::IndexMap;
use tracing::debug;

use scrubline_api_core::blend::{apply_delta, delta, zero_delta};
use scrubline_api_core::{PropertyKey, TargetHandle, Value, WriteOp};

use crate::ids::TweenId;
use crate::tween::{ConflictPolicy, Owner, ResolvedTween, TweenState};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelKey {
    pub target: TargetHandle,
    pub property: PropertyKey,
}

impl ChannelKey {
    pub fn new(target: impl Into<TargetHandle>, property: PropertyKey) -> Self {
        Self {
            target: target.into(),
            property,
        }
    }

    fn of(tween: &ResolvedTween) -> Self {
        Self::new(tween.target.clone(), tween.property.clone())
    }
}

/// Outcome of scheduling one tween.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scheduled {
    Active(TweenId),
    /// Dropped by [`ConflictPolicy::IgnoreIfActive`].
    Ignored,
}

impl Scheduled {
    pub fn id(&self) -> Option<TweenId> {
        match self {
            Scheduled::Active(id) => Some(*id),
            Scheduled::Ignored => None,
        }
    }
}

#[derive(Debug)]
pub struct ScheduleOutcome {
    pub scheduled: Scheduled,
    /// Tweens cancelled to make room, with their owners.
    pub cancelled: Vec<(TweenId, Owner)>,
}

#[derive(Debug)]
struct Slot {
    tween: ResolvedTween,
    owner: Owner,
    state: TweenState,
    progress: f32,
    elapsed: f32,
    start: f32,
    seq: u64,
    started: bool,
    anchor: Value,
}

impl Slot {
    fn is_additive(&self) -> bool {
        self.tween.conflict == ConflictPolicy::CoexistAdditively
    }

    fn current(&self) -> Value {
        self.tween.value_at(self.progress)
    }
}

#[derive(Debug)]
struct Channel {
    baseline: Value,
    offset: Value,
    output: Value,
    written: Option<Value>,
    members: Vec<TweenId>,
}

impl Channel {
    fn new(initial: Value) -> Self {
        Self {
            offset: zero_delta(&initial),
            output: initial.clone(),
            baseline: initial,
            written: None,
            members: Vec::new(),
        }
    }

    fn add_offset(&mut self, contribution: &Value) {
        if let Ok(sum) = apply_delta(&self.offset, contribution) {
            self.offset = sum;
        }
    }

    /// Once nothing animates the channel it rests at what the host last saw.
    fn rest(&mut self) {
        if let Some(written) = &self.written {
            self.output = written.clone();
        }
        self.fold();
    }

    /// Make the current output the baseline with no settled offset on top.
    fn fold(&mut self) {
        self.baseline = self.output.clone();
        self.offset = zero_delta(&self.output);
    }

    fn at_rest_on(&self, default: &Value) -> bool {
        self.members.is_empty() && self.output == *default && self.baseline == *default
    }
}

/// Whether scheduling a tween with `policy` for `owner` removes `slot` from the pair.
/// A binding supersedes its own tweens; replace removes everyone else's.
fn displaces(policy: ConflictPolicy, owner: Owner, slot: &Slot) -> bool {
    if owner != Owner::Standalone && slot.owner == owner {
        matches!(owner, Owner::Binding(_))
    } else {
        policy == ConflictPolicy::ReplaceExisting
    }
}

/// The channel's output without the contributions of additive tweens that
/// `survives` keeps. This is where a new absolute tween has to start.
fn absolute_layer(
    tweens: &IndexMap<TweenId, Slot>,
    channel: &Channel,
    survives: impl Fn(&Slot) -> bool,
) -> Value {
    let mut layer = channel.output.clone();
    for slot in channel.members.iter().filter_map(|id| tweens.get(id)) {
        if slot.is_additive() && survives(slot) {
            let contribution = slot.tween.offset_at(slot.progress, &slot.anchor);
            if let Ok(v) = delta(&contribution, &layer) {
                layer = v;
            }
        }
    }
    layer
}

/// Result of one evaluation pass.
#[derive(Debug, Default)]
pub struct Evaluation {
    pub writes: Vec<WriteOp>,
    /// Standalone tweens that finished this frame and were retired. A binding's
    /// finished tween stays on its pair until the next one from that binding
    /// supersedes it, so the binding always knows where its contribution is.
    pub settled: Vec<TweenId>,
}

#[derive(Debug, Default)]
pub struct TweenScheduler {
    tweens: IndexMap<TweenId, Slot>,
    channels: IndexMap<ChannelKey, Channel>,
    labels: HashMap<String, TweenId>,
    seq: u64,
}

impl TweenScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tweens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Last resolved value of a pair, or the property default if nothing touched it.
    pub fn current_value(&self, key: &ChannelKey) -> Value {
        self.channels
            .get(key)
            .map(|c| c.output.clone())
            .unwrap_or_else(|| key.property.default_value())
    }

    pub fn baseline(&self, key: &ChannelKey) -> Value {
        self.channels
            .get(key)
            .map(|c| c.baseline.clone())
            .unwrap_or_else(|| key.property.default_value())
    }

    pub fn is_animating(&self, key: &ChannelKey) -> bool {
        self.channels
            .get(key)
            .is_some_and(|c| !c.members.is_empty())
    }

    pub fn tween(&self, id: TweenId) -> Option<&ResolvedTween> {
        self.tweens.get(&id).map(|s| &s.tween)
    }

    pub fn owner(&self, id: TweenId) -> Option<Owner> {
        self.tweens.get(&id).map(|s| s.owner)
    }

    /// Unknown ids report `Disposed`; ids are never reused.
    pub fn state(&self, id: TweenId) -> TweenState {
        self.tweens
            .get(&id)
            .map(|s| s.state)
            .unwrap_or(TweenState::Disposed)
    }

    pub fn progress(&self, id: TweenId) -> Option<f32> {
        self.tweens.get(&id).map(|s| s.progress)
    }

    pub fn labelled(&self, label: &str) -> Option<TweenId> {
        self.labels.get(label).copied()
    }

    /// Start value for a tween whose `from` is the current value.
    ///
    /// Additive tweens start from the baseline so their offset begins at zero,
    /// unless the same pointer binding already has a tween in flight, in which
    /// case they continue from where that one is. Absolute tweens start from
    /// the output minus the additive tweens that will keep running beside them.
    pub fn start_value(&self, key: &ChannelKey, policy: ConflictPolicy, owner: Owner) -> Value {
        if policy != ConflictPolicy::CoexistAdditively {
            return match self.channels.get(key) {
                Some(channel) => absolute_layer(&self.tweens, channel, |s| {
                    !displaces(policy, owner, s)
                }),
                None => key.property.default_value(),
            };
        }
        if let (Owner::Binding(_), Some(channel)) = (owner, self.channels.get(key)) {
            let pred = channel
                .members
                .iter()
                .filter_map(|id| self.tweens.get(id))
                .rfind(|s| s.owner == owner);
            if let Some(pred) = pred {
                return pred.current();
            }
        }
        self.baseline(key)
    }

    /// Seed or overwrite a pair's resting value.
    pub fn set_value(&mut self, key: ChannelKey, value: Value) {
        let channel = self
            .channels
            .entry(key)
            .or_insert_with(|| Channel::new(value.clone()));
        channel.offset = zero_delta(&value);
        channel.baseline = value.clone();
        if channel.members.is_empty() {
            channel.output = value;
        }
    }

    /// Add a tween to its channel, applying its conflict policy.
    /// `start` is the offset inside its timeline (zero for standalone tweens).
    pub fn schedule(&mut self, tween: ResolvedTween, owner: Owner, start: f32) -> ScheduleOutcome {
        let key = ChannelKey::of(&tween);
        let initial = key.property.default_value();
        let channel = self
            .channels
            .entry(key.clone())
            .or_insert_with(|| Channel::new(initial));

        let tweens = &self.tweens;
        let policy = tween.conflict;
        let mut cancelled = Vec::new();
        if policy == ConflictPolicy::IgnoreIfActive {
            let blocked = channel
                .members
                .iter()
                .filter_map(|id| tweens.get(id))
                .filter(|s| owner == Owner::Standalone || s.owner != owner)
                .any(|s| {
                    !(matches!(s.owner, Owner::Binding(_)) && s.state == TweenState::Settled)
                });
            if blocked {
                debug!(
                    target_handle = %key.target,
                    property = %key.property,
                    "tween ignored, pair already animating"
                );
                return ScheduleOutcome {
                    scheduled: Scheduled::Ignored,
                    cancelled,
                };
            }
        }

        let displaced: Vec<TweenId> = channel
            .members
            .iter()
            .copied()
            .filter(|id| tweens.get(id).is_some_and(|s| displaces(policy, owner, s)))
            .collect();
        let absolute_survives = channel
            .members
            .iter()
            .filter(|id| !displaced.contains(id))
            .filter_map(|id| tweens.get(id))
            .any(|s| !s.is_additive());
        let layer = (policy != ConflictPolicy::CoexistAdditively && !absolute_survives)
            .then(|| absolute_layer(tweens, &*channel, |s| !displaces(policy, owner, s)));

        for id in &displaced {
            let Some(slot) = self.tweens.shift_remove(id) else {
                continue;
            };
            if let Some(label) = &slot.tween.label {
                if self.labels.get(label) == Some(id) {
                    self.labels.remove(label);
                }
            }
            // Beside a surviving absolute tween a removed offset is kept, not dropped.
            if absolute_survives && slot.is_additive() && slot.owner != owner {
                channel.add_offset(&slot.tween.offset_at(slot.progress, &slot.anchor));
            }
            cancelled.push((*id, slot.owner));
        }
        channel.members.retain(|m| !displaced.contains(m));
        if let Some(layer) = layer {
            channel.baseline = layer;
            channel.offset = zero_delta(&channel.baseline);
        }
        if policy == ConflictPolicy::ReplaceExisting && !cancelled.is_empty() {
            debug!(
                target_handle = %key.target,
                property = %key.property,
                count = cancelled.len(),
                "replaced existing tweens"
            );
        }

        let id = tween.id;
        if let Some(label) = &tween.label {
            self.labels.insert(label.clone(), id);
        }
        self.seq += 1;
        let started = !matches!(owner, Owner::Timeline(_));
        self.tweens.insert(
            id,
            Slot {
                anchor: channel.baseline.clone(),
                tween,
                owner,
                state: TweenState::Created,
                progress: 0.0,
                elapsed: 0.0,
                start,
                seq: self.seq,
                started,
            },
        );
        channel.members.push(id);
        ScheduleOutcome {
            scheduled: Scheduled::Active(id),
            cancelled,
        }
    }

    /// Remove a tween, leaving its pair at the value it currently shows.
    pub fn cancel(&mut self, id: TweenId) -> bool {
        let Some(slot) = self.tweens.shift_remove(&id) else {
            return false;
        };
        if let Some(label) = &slot.tween.label {
            if self.labels.get(label) == Some(&id) {
                self.labels.remove(label);
            }
        }
        let key = ChannelKey::of(&slot.tween);
        if let Some(channel) = self.channels.get_mut(&key) {
            channel.members.retain(|m| *m != id);
            if channel.members.is_empty() {
                channel.rest();
            } else if slot.is_additive() {
                channel.add_offset(&slot.tween.offset_at(slot.progress, &slot.anchor));
            } else {
                channel.baseline = slot.current();
            }
        }
        true
    }

    /// Cancel every tween with `owner`. Returns how many were removed.
    pub fn cancel_owner(&mut self, owner: Owner) -> usize {
        let ids: Vec<TweenId> = self
            .tweens
            .iter()
            .filter(|(_, s)| s.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Advance every clock-driven tween.
    pub fn advance(&mut self, dt: f32) {
        for slot in self.tweens.values_mut() {
            if matches!(slot.owner, Owner::Timeline(_)) || slot.state == TweenState::Settled {
                continue;
            }
            slot.elapsed += dt;
            let (p, done) = slot.tween.timing.progress_at(slot.elapsed);
            slot.progress = p;
            slot.state = if done {
                TweenState::Settled
            } else {
                TweenState::Active
            };
        }
    }

    /// Push a timeline's view of one of its tweens.
    pub fn set_timeline_progress(&mut self, id: TweenId, progress: f32, started: bool) {
        if let Some(slot) = self.tweens.get_mut(&id) {
            slot.progress = progress;
            slot.started = started;
            slot.state = if progress >= 1.0 && started {
                TweenState::Settled
            } else if started && progress > 0.0 {
                TweenState::Active
            } else {
                TweenState::Created
            };
        }
    }

    /// Compute every channel's output, emit writes for values that changed, and
    /// retire standalone tweens that finished.
    pub fn evaluate(&mut self, epsilon: f32) -> Evaluation {
        let mut out = Evaluation::default();
        let tweens = &self.tweens;
        for (key, channel) in self.channels.iter_mut() {
            let members: Vec<&Slot> = channel
                .members
                .iter()
                .filter_map(|id| tweens.get(id))
                .collect();

            // Latest-started absolute tween governs; if none has started, the
            // earliest one holds its start value.
            let absolutes: Vec<&Slot> = members
                .iter()
                .copied()
                .filter(|s| !s.is_additive())
                .collect();
            let governing = absolutes
                .iter()
                .copied()
                .filter(|s| s.started)
                .max_by(|a, b| by_rank(a, b))
                .or_else(|| absolutes.iter().copied().min_by(|a, b| by_rank(a, b)));

            let mut value = governing
                .map(|s| s.current())
                .unwrap_or_else(|| channel.baseline.clone());
            for slot in members.iter().filter(|s| s.is_additive()) {
                let contribution = slot.tween.offset_at(slot.progress, &slot.anchor);
                if let Ok(v) = apply_delta(&value, &contribution) {
                    value = v;
                }
            }
            if let Ok(v) = apply_delta(&value, &channel.offset) {
                value = v;
            }
            channel.output = value;

            let moving = members.iter().any(|s| s.state == TweenState::Active);
            let emit = match &channel.written {
                None => !members.is_empty() || channel.output != key.property.default_value(),
                Some(prev) => match prev.max_abs_diff(&channel.output) {
                    None => true,
                    Some(diff) => diff > epsilon || (!moving && diff > 0.0),
                },
            };
            if emit {
                out.writes.push(WriteOp::new(
                    key.target.clone(),
                    key.property.clone(),
                    channel.output.clone(),
                ));
                channel.written = Some(channel.output.clone());
            }
        }

        let finished: Vec<TweenId> = self
            .tweens
            .iter()
            .filter(|(_, s)| s.owner == Owner::Standalone && s.state == TweenState::Settled)
            .map(|(id, _)| *id)
            .collect();
        for id in finished {
            self.settle(id);
            out.settled.push(id);
        }

        // A pair back at its property default carries no state worth keeping.
        let before = self.channels.len();
        self.channels
            .retain(|key, channel| !channel.at_rest_on(&key.property.default_value()));
        if self.channels.len() < before {
            debug!(dropped = before - self.channels.len(), "idle channels dropped");
        }
        out
    }

    fn settle(&mut self, id: TweenId) {
        let Some(slot) = self.tweens.shift_remove(&id) else {
            return;
        };
        if let Some(label) = &slot.tween.label {
            if self.labels.get(label) == Some(&id) {
                self.labels.remove(label);
            }
        }
        let key = ChannelKey::of(&slot.tween);
        if let Some(channel) = self.channels.get_mut(&key) {
            channel.members.retain(|m| *m != id);
            if channel.members.is_empty() {
                channel.fold();
            } else if slot.is_additive() {
                channel.add_offset(&slot.tween.offset_at(slot.progress, &slot.anchor));
            } else {
                channel.baseline = slot.current();
            }
        }
    }
}

/// Order by timeline start offset, then by scheduling order.
fn by_rank(a: &Slot, b: &Slot) -> Ordering {
    a.start.total_cmp(&b.start).then(a.seq.cmp(&b.seq))
}
