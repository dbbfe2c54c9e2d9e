//! Strip group transfer and seed row management.
//!
//! A strip group holds, for every colorant, `lines` scan lines of `planes`
//! bit planes each. The planes of a group are laid out strip after strip,
//! line after line, so plane `p` of line `l` in a strip starting at plane
//! `base` has index `base + l * planes + p`.
//!
//! [`TransferSequencer`] owns two sets of plane buffers: `next`, filled by
//! the caller for the group being built, and `previous`, holding the group
//! sent last. Differential compression encodes each plane against its seed
//! row. After a successful transfer the two sets trade places.

use log::{debug, trace};
use std::mem;

use crate::{
    compress::{compress_within, CompressionMethod},
    error::Error,
    octets::OctetString,
};

/// Octets spent on a compression method switch (`ESC * b # M`).
pub const SWITCH_COST: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No raster session.
    Idle,
    /// Planes of the current group are being filled.
    InGroup,
    /// The last group has been sent and is now the seed.
    AwaitingNextGroup,
}

/// Bit planes of one colorant within a strip group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripLayout {
    /// Bit planes per scan line.
    pub planes: usize,
    /// Scan lines per strip.
    pub lines: usize,
}

/// Where a plane finds its seed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// A plane of the group sent last.
    Previous(usize),
    /// A plane of the current group, sent just before.
    Next(usize),
}

/// Receiver of the raster data, implemented by the protocol layer.
pub trait RasterSink {
    fn begin_raster(&mut self) -> Result<(), Error>;

    fn set_compression(&mut self, method: CompressionMethod) -> Result<(), Error>;

    /// Transfer one plane. `last_in_group` is set for the plane completing
    /// a strip group, which advances the printer to the next group.
    fn transfer_plane(&mut self, data: &[u8], last_in_group: bool) -> Result<(), Error>;

    /// Skip `count` blank strip groups. The printer clears its seed rows.
    fn skip_groups(&mut self, count: usize) -> Result<(), Error>;

    fn end_raster(&mut self) -> Result<(), Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RasterEvent {
    BeginRaster,
    SetCompression(CompressionMethod),
    Plane { data: Vec<u8>, last_in_group: bool },
    SkipGroups(usize),
    EndRaster,
}

/// Sink recording everything it receives.
#[derive(Debug, Clone, Default)]
pub struct RasterLog {
    events: Vec<RasterEvent>,
}

impl RasterLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RasterEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Plane payloads plus the method switches.
    pub fn wire_octets(&self) -> usize {
        self.events
            .iter()
            .map(|event| match event {
                RasterEvent::SetCompression(_) => SWITCH_COST,
                RasterEvent::Plane { data, .. } => data.len(),
                _ => 0,
            })
            .sum()
    }
}

impl RasterSink for RasterLog {
    fn begin_raster(&mut self) -> Result<(), Error> {
        self.events.push(RasterEvent::BeginRaster);
        Ok(())
    }

    fn set_compression(&mut self, method: CompressionMethod) -> Result<(), Error> {
        self.events.push(RasterEvent::SetCompression(method));
        Ok(())
    }

    fn transfer_plane(&mut self, data: &[u8], last_in_group: bool) -> Result<(), Error> {
        self.events.push(RasterEvent::Plane {
            data: data.to_vec(),
            last_in_group,
        });
        Ok(())
    }

    fn skip_groups(&mut self, count: usize) -> Result<(), Error> {
        self.events.push(RasterEvent::SkipGroups(count));
        Ok(())
    }

    fn end_raster(&mut self) -> Result<(), Error> {
        self.events.push(RasterEvent::EndRaster);
        Ok(())
    }
}

/// Buffer holding the octets to send for a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    Plane,
    Primary,
    Secondary,
}

#[derive(Debug)]
pub struct TransferSequencer {
    compression: CompressionMethod,
    seeds: Vec<SeedSource>,
    /// Planes sent after all others when CMY goes first.
    black_planes: Option<usize>,
    previous: Vec<OctetString>,
    next: Vec<OctetString>,
    workspace: [OctetString; 2],
    active: CompressionMethod,
    raster_open: bool,
    state: SessionState,
}

impl TransferSequencer {
    /// Allocate plane buffers of `plane_capacity` octets for the strips.
    pub fn new(
        strips: &[StripLayout],
        plane_capacity: usize,
        compression: CompressionMethod,
    ) -> Result<Self, Error> {
        if strips.is_empty() {
            return Err(Error::InvalidConfig("no colorant strips".to_string()));
        }
        if let Some(strip) = strips.iter().find(|s| s.planes == 0 || s.lines == 0) {
            return Err(Error::InvalidConfig(format!(
                "strip needs at least one plane and line, got {:?}",
                strip
            )));
        }

        let mut seeds = Vec::new();
        let mut base = 0;
        for strip in strips {
            // first line: same plane of the strip's last line in the previous group
            for plane in 0..strip.planes {
                seeds.push(SeedSource::Previous(base + (strip.lines - 1) * strip.planes + plane));
            }
            for line in 1..strip.lines {
                for plane in 0..strip.planes {
                    seeds.push(SeedSource::Next(base + (line - 1) * strip.planes + plane));
                }
            }
            base += strip.planes * strip.lines;
        }
        let planes = seeds.len();

        Ok(TransferSequencer {
            compression,
            seeds,
            black_planes: None,
            previous: vec![OctetString::with_capacity(plane_capacity); planes],
            next: vec![OctetString::with_capacity(plane_capacity); planes],
            workspace: [
                OctetString::with_capacity(plane_capacity + SWITCH_COST),
                OctetString::with_capacity(plane_capacity + SWITCH_COST),
            ],
            active: CompressionMethod::None,
            raster_open: false,
            state: SessionState::Idle,
        })
    }

    /// Send the first `black_planes` planes of each group last, for
    /// printers expecting CMY before K.
    pub fn order_cmyk(self, black_planes: usize) -> Self {
        let black_planes = black_planes.min(self.next.len());
        TransferSequencer {
            black_planes: Some(black_planes),
            ..self
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The requested compression method.
    pub fn compression(&self) -> CompressionMethod {
        self.compression
    }

    /// The method the printer currently decodes with.
    pub fn current_compression(&self) -> CompressionMethod {
        self.active
    }

    pub fn plane_count(&self) -> usize {
        self.next.len()
    }

    pub fn seed_source(&self, plane: usize) -> SeedSource {
        self.seeds[plane]
    }

    /// Seed row of `plane` in the current group.
    pub fn seed(&self, plane: usize) -> &OctetString {
        match self.seeds[plane] {
            SeedSource::Previous(index) => &self.previous[index],
            SeedSource::Next(index) => &self.next[index],
        }
    }

    /// Begin a strip group, returning the plane buffers to fill.
    ///
    /// The buffers may hold stale data; every plane must be written and
    /// given its length before [`TransferSequencer::transmit_group`].
    pub fn start_group(&mut self) -> Result<&mut [OctetString], Error> {
        match self.state {
            SessionState::InGroup => {
                return Err(Error::UnexpectedState {
                    operation: "start a group",
                    state: self.state,
                })
            }
            SessionState::Idle => {
                self.reset_seed();
                self.active = CompressionMethod::None;
            }
            SessionState::AwaitingNextGroup => {}
        }
        self.state = SessionState::InGroup;
        Ok(&mut self.next)
    }

    /// Compress and send every plane of the current group.
    ///
    /// Returns the number of payload octets sent. On failure the group stays
    /// current and the seed rows are left untouched.
    pub fn transmit_group<S: RasterSink + ?Sized>(&mut self, sink: &mut S) -> Result<usize, Error> {
        if self.state != SessionState::InGroup {
            return Err(Error::UnexpectedState {
                operation: "transmit a group",
                state: self.state,
            });
        }
        self.open_raster(sink)?;

        let planes = self.next.len();
        let (first, second) = match self.black_planes {
            Some(black) => (black..planes, 0..black),
            None => (0..planes, 0..0),
        };
        let mut sent = 0;

        for (position, index) in first.chain(second).enumerate() {
            let plane = &self.next[index];
            let seed = match self.seeds[index] {
                SeedSource::Previous(i) => &self.previous[i],
                SeedSource::Next(i) => &self.next[i],
            };
            let [primary, secondary] = &mut self.workspace;
            let (method, payload) =
                choose_method(self.compression, self.active, plane, seed, primary, secondary);

            if method != self.active {
                debug!("Switching compression {:?} -> {:?}", self.active, method);
                sink.set_compression(method)?;
                self.active = method;
            }
            let data = match payload {
                Payload::Plane => plane.as_bytes(),
                Payload::Primary => primary.as_bytes(),
                Payload::Secondary => secondary.as_bytes(),
            };
            trace!(
                "plane {}: {} octets as {:?} ({} raw)",
                index,
                data.len(),
                method,
                plane.len()
            );
            sink.transfer_plane(data, position + 1 == planes)?;
            sent += data.len();
        }

        if self.compression.is_differential() {
            mem::swap(&mut self.previous, &mut self.next);
        }
        self.state = SessionState::AwaitingNextGroup;
        Ok(sent)
    }

    /// Forget the seed rows, as the printer does after a skip.
    pub fn reset_seed(&mut self) {
        for plane in self.previous.iter_mut() {
            plane.clear();
        }
    }

    /// Drop the current group without sending it.
    pub fn discard_group(&mut self) {
        if self.state == SessionState::InGroup {
            self.state = if self.raster_open {
                SessionState::AwaitingNextGroup
            } else {
                SessionState::Idle
            };
        }
    }

    /// Skip `count` blank groups. Seed rows are reset.
    ///
    /// May be called while a group is being built, before it is sent; its
    /// planes are kept.
    pub fn skip_groups<S: RasterSink + ?Sized>(&mut self, count: usize, sink: &mut S) -> Result<(), Error> {
        if count == 0 {
            return Ok(());
        }
        self.open_raster(sink)?;
        debug!("Skipping {} blank groups", count);
        sink.skip_groups(count)?;
        self.reset_seed();
        if self.state != SessionState::InGroup {
            self.state = SessionState::AwaitingNextGroup;
        }
        Ok(())
    }

    /// Forget the session without telling the sink, e.g. after a failed
    /// transfer.
    pub fn reset(&mut self) {
        self.raster_open = false;
        self.active = CompressionMethod::None;
        self.reset_seed();
        self.state = SessionState::Idle;
    }

    /// Close the raster session. A group in progress is dropped.
    pub fn end_session<S: RasterSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), Error> {
        if self.raster_open {
            sink.end_raster()?;
            debug!("Raster session closed");
        }
        self.raster_open = false;
        self.active = CompressionMethod::None;
        self.reset_seed();
        self.state = SessionState::Idle;
        Ok(())
    }

    fn open_raster<S: RasterSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), Error> {
        if !self.raster_open {
            sink.begin_raster()?;
            debug!(
                "Raster session opened: {} planes, {:?}",
                self.next.len(),
                self.compression
            );
            self.raster_open = true;
            self.active = CompressionMethod::None;
            self.reset_seed();
        }
        Ok(())
    }
}

/// Pick the cheapest way to send `plane` given the requested method.
///
/// The cost of an encoding includes switching to its method. Nothing may
/// cost more than sending the plane uncompressed, including the switch back
/// to no compression.
fn choose_method(
    requested: CompressionMethod,
    active: CompressionMethod,
    plane: &OctetString,
    seed: &OctetString,
    primary: &mut OctetString,
    secondary: &mut OctetString,
) -> (CompressionMethod, Payload) {
    let switch = |method: CompressionMethod| if method == active { 0 } else { SWITCH_COST };
    let budget = plane.len() + switch(CompressionMethod::None);

    match requested {
        CompressionMethod::None => (CompressionMethod::None, Payload::Plane),

        CompressionMethod::DeltaRow => {
            let delta = compress_within(CompressionMethod::DeltaRow, plane, Some(seed), primary, budget)
                .ok()
                .map(|()| primary.len() + switch(CompressionMethod::DeltaRow));

            let tiff = if delta == Some(0) {
                None
            } else {
                let mut bound = budget;
                if let Some(cost) = delta {
                    if cost < bound {
                        // only worth it when shorter than the delta row
                        bound = cost;
                        if active != CompressionMethod::PackBits && bound >= SWITCH_COST {
                            bound -= SWITCH_COST;
                        }
                    }
                }
                compress_within(CompressionMethod::PackBits, plane, None, secondary, bound)
                    .ok()
                    .map(|()| secondary.len() + switch(CompressionMethod::PackBits))
            };

            match (delta, tiff) {
                (None, None) => (CompressionMethod::None, Payload::Plane),
                (None, Some(_)) => (CompressionMethod::PackBits, Payload::Secondary),
                (Some(_), None) => (CompressionMethod::DeltaRow, Payload::Primary),
                (Some(delta), Some(tiff)) => {
                    if delta < tiff || (delta == tiff && active != CompressionMethod::PackBits) {
                        (CompressionMethod::DeltaRow, Payload::Primary)
                    } else {
                        (CompressionMethod::PackBits, Payload::Secondary)
                    }
                }
            }
        }

        method => match compress_within(method, plane, Some(seed), primary, budget) {
            Ok(()) => (method, Payload::Primary),
            Err(_) => (CompressionMethod::None, Payload::Plane),
        },
    }
}
