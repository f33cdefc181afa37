//! Axis-aligned rigid bodies with gravity, world bounds and registered solid contacts.
//!
//! Bodies live in an arena and are addressed by generational [`BodyHandle`]s, so game records
//! can hold a plain handle instead of a reference. Solid contact is only resolved between pairs
//! that were registered with [`PhysicsWorld::add_collider`]; registration is not retroactive.
//! Coordinates are top-left origin with y growing downwards.

use std::ops::{Index, IndexMut};

/// Fraction of a body's smallest extent it may travel in one substep.
const SAFETY_FACTOR: f32 = 0.25;
const MAX_SUBSTEPS: u32 = 64;
/// Extra penetration tolerated on top of a substep's own motion before an overlap counts as
/// pre-existing rather than caused by that motion.
pub const OVERLAP_BIAS: f32 = 4.0;

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down.
    pub y: f32,
}

impl Vector2 {
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Directions in which a body touched something during the last update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blocked {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl Blocked {
    pub fn none(&self) -> bool {
        !(self.left || self.right || self.up || self.down)
    }

    fn merge(&mut self, other: Blocked) {
        self.left |= other.left;
        self.right |= other.right;
        self.up |= other.up;
        self.down |= other.down;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Static,
}

#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub kind: BodyKind,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub velocity: Vector2,
    pub allow_gravity: bool,
    /// When false the body is skipped by integration but still blocks others.
    pub moves: bool,
    /// Whether another moving body may shove this one sideways instead of stopping.
    pub pushable: bool,
    pub collide_world_bounds: bool,
    pub blocked: Blocked,
}

impl Body {
    fn new(kind: BodyKind, x: f32, y: f32, width: f32, height: f32) -> Self {
        let dynamic = kind == BodyKind::Dynamic;
        Self {
            kind,
            x,
            y,
            width,
            height,
            velocity: Vector2::default(),
            allow_gravity: dynamic,
            moves: dynamic,
            pushable: dynamic,
            collide_world_bounds: false,
            blocked: Blocked::default(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &Body) -> bool {
        shared::check_overlap(
            (self.x, self.y, self.right(), self.bottom()),
            (other.x, other.y, other.right(), other.bottom()),
        )
    }

    /// Standing on something with no velocity of its own.
    pub fn is_at_rest(&self) -> bool {
        self.velocity.is_zero() && self.blocked.down
    }

    fn is_simulated(&self) -> bool {
        self.kind == BodyKind::Dynamic && self.moves
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    body: Option<Body>,
    colliders: Vec<BodyHandle>,
}

/// Arena of bodies plus the pairwise collider graph between them.
#[derive(Debug)]
pub struct PhysicsWorld {
    slots: Vec<Slot>,
    free: Vec<u32>,
    gravity: f32,
    width: f32,
    height: f32,
}

impl PhysicsWorld {
    pub fn new(width: f32, height: f32, gravity: f32) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            gravity,
            width,
            height,
        }
    }

    /// Adds a dynamic body affected by gravity.
    pub fn add_body(&mut self, x: f32, y: f32, width: f32, height: f32) -> BodyHandle {
        self.insert(Body::new(BodyKind::Dynamic, x, y, width, height))
    }

    /// Adds an immovable body without gravity.
    pub fn add_static_body(&mut self, x: f32, y: f32, width: f32, height: f32) -> BodyHandle {
        self.insert(Body::new(BodyKind::Static, x, y, width, height))
    }

    fn insert(&mut self, body: Body) -> BodyHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.body = Some(body);
            slot.colliders.clear();
            BodyHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                body: Some(body),
                colliders: Vec::new(),
            });
            BodyHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Removes a body and every collider that references it.
    pub fn destroy(&mut self, handle: BodyHandle) -> bool {
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.body = None;
        slot.generation = slot.generation.wrapping_add(1);
        let partners = std::mem::take(&mut slot.colliders);

        for partner in partners {
            if let Some(other) = self.slot_mut(partner) {
                other.colliders.retain(|h| *h != handle);
            }
        }

        self.free.push(handle.index);
        true
    }

    /// Registers solid contact between two bodies. Returns false for stale, identical or
    /// already-registered pairs.
    pub fn add_collider(&mut self, a: BodyHandle, b: BodyHandle) -> bool {
        if a == b || self.get(a).is_none() || self.get(b).is_none() {
            return false;
        }
        if self.slots[a.index as usize].colliders.contains(&b) {
            return false;
        }

        self.slots[a.index as usize].colliders.push(b);
        self.slots[b.index as usize].colliders.push(a);
        true
    }

    pub fn colliders(&self, handle: BodyHandle) -> &[BodyHandle] {
        self.slot(handle)
            .map(|slot| slot.colliders.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.slot(handle).and_then(|slot| slot.body.as_ref())
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.slot_mut(handle).and_then(|slot| slot.body.as_mut())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.body.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_velocity_x(&mut self, handle: BodyHandle, velocity: f32) {
        self[handle].velocity.x = velocity;
    }

    pub fn set_velocity_y(&mut self, handle: BodyHandle, velocity: f32) {
        self[handle].velocity.y = velocity;
    }

    pub fn set_moves(&mut self, handle: BodyHandle, moves: bool) {
        self[handle].moves = moves;
    }

    pub fn set_pushable(&mut self, handle: BodyHandle, pushable: bool) {
        self[handle].pushable = pushable;
    }

    pub fn set_collide_world_bounds(&mut self, handle: BodyHandle, collide: bool) {
        self[handle].collide_world_bounds = collide;
    }

    /// Teleports a body, dropping its velocity and contact flags.
    pub fn reset(&mut self, handle: BodyHandle, x: f32, y: f32) {
        let body = &mut self[handle];
        body.x = x;
        body.y = y;
        body.velocity = Vector2::default();
        body.blocked = Blocked::default();
    }

    /// Bounding-box overlap test that does not require a collider.
    pub fn overlaps(&self, a: BodyHandle, b: BodyHandle) -> bool {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => false,
        }
    }

    /// True when a body overlaps any of its registered colliders.
    pub fn is_embedded(&self, handle: BodyHandle) -> bool {
        let Some(body) = self.get(handle) else {
            return false;
        };
        self.colliders(handle)
            .iter()
            .filter_map(|partner| self.get(*partner))
            .any(|other| body.overlaps(other))
    }

    /// Advances the world by `dt` seconds, refreshing every simulated body's contact flags.
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        for body in self.slots.iter_mut().filter_map(|slot| slot.body.as_mut()) {
            if body.is_simulated() {
                body.blocked = Blocked::default();
            }
        }

        let substeps = self.calculate_required_substeps(dt);
        let substep_dt = dt / substeps as f32;
        for _ in 0..substeps {
            self.step(substep_dt);
        }
    }

    /// Calculates physics substeps required to prevent collision tunneling
    pub fn calculate_required_substeps(&self, dt: f32) -> u32 {
        let mut substeps = 1;

        for body in self.slots.iter().filter_map(|slot| slot.body.as_ref()) {
            if !body.is_simulated() {
                continue;
            }

            let max_movement_per_step = body.width.min(body.height) * SAFETY_FACTOR;
            let fall_speed = if body.allow_gravity {
                body.velocity.y.abs() + self.gravity * dt
            } else {
                body.velocity.y.abs()
            };
            let max_movement_this_tick = body.velocity.x.abs().max(fall_speed) * dt;

            if max_movement_this_tick > max_movement_per_step {
                let needed = (max_movement_this_tick / max_movement_per_step).ceil() as u32;
                substeps = substeps.max(needed);
            }
        }

        substeps.min(MAX_SUBSTEPS)
    }

    fn step(&mut self, dt: f32) {
        for index in 0..self.slots.len() {
            let Some(mut body) = self.slots[index].body else {
                continue;
            };
            if !body.is_simulated() {
                continue;
            }

            let mut blocked = Blocked::default();

            if body.allow_gravity {
                body.velocity.y += self.gravity * dt;
            }

            // Horizontal pass. Only overlaps this substep's motion can explain are separated
            // along x; deeper ones are left to the vertical pass.
            let moving_x = body.velocity.x;
            body.x += moving_x * dt;
            if moving_x != 0.0 {
                let max_overlap = (moving_x * dt).abs() + OVERLAP_BIAS;
                for k in 0..self.slots[index].colliders.len() {
                    let partner = self.slots[index].colliders[k];
                    let Some(mut other) = self.get(partner).copied() else {
                        continue;
                    };
                    if !body.overlaps(&other) {
                        continue;
                    }

                    let penetration = if moving_x > 0.0 {
                        body.right() - other.x
                    } else {
                        other.right() - body.x
                    };
                    if penetration > max_overlap {
                        continue;
                    }

                    if other.pushable && other.is_simulated() {
                        if moving_x > 0.0 {
                            other.x = body.right();
                        } else {
                            other.x = body.x - other.width;
                        }
                        self[partner] = other;
                    } else if moving_x > 0.0 {
                        body.x = other.x - body.width;
                        body.velocity.x = 0.0;
                        blocked.right = true;
                    } else {
                        body.x = other.right();
                        body.velocity.x = 0.0;
                        blocked.left = true;
                    }
                }
            }

            // Vertical pass. The first sweep separates against the direction of motion when the
            // overlap is shallow; anything still overlapping afterwards is lifted onto the
            // obstacle's top, which only ever moves the body upwards and so settles.
            let moving_y = body.velocity.y;
            body.y += moving_y * dt;
            let max_overlap = (moving_y * dt).abs() + OVERLAP_BIAS;
            let colliders = self.slots[index].colliders.len();
            for sweep in 0..=colliders {
                let mut separated = false;

                for k in 0..colliders {
                    let partner = self.slots[index].colliders[k];
                    let Some(other) = self.get(partner).copied() else {
                        continue;
                    };
                    if !body.overlaps(&other) {
                        continue;
                    }
                    separated = true;

                    let lift = body.bottom() - other.y;
                    let drop = other.bottom() - body.y;
                    let upwards = if sweep == 0 && moving_y >= 0.0 && lift <= max_overlap {
                        true
                    } else if sweep == 0 && moving_y < 0.0 && drop <= max_overlap {
                        false
                    } else {
                        !body.collide_world_bounds || other.y - body.height >= 0.0
                    };

                    if upwards {
                        body.y = other.y - body.height;
                        blocked.down = true;
                    } else {
                        body.y = other.bottom();
                        blocked.up = true;
                    }
                    body.velocity.y = 0.0;
                }

                if !separated {
                    break;
                }
            }

            if body.collide_world_bounds {
                self.clamp_to_bounds(&mut body, &mut blocked);
            }

            body.blocked.merge(blocked);
            self.slots[index].body = Some(body);
        }
    }

    fn clamp_to_bounds(&self, body: &mut Body, blocked: &mut Blocked) {
        if body.x < 0.0 {
            body.x = 0.0;
            body.velocity.x = body.velocity.x.max(0.0);
            blocked.left = true;
        } else if body.right() > self.width {
            body.x = self.width - body.width;
            body.velocity.x = body.velocity.x.min(0.0);
            blocked.right = true;
        }

        if body.y < 0.0 {
            body.y = 0.0;
            body.velocity.y = body.velocity.y.max(0.0);
            blocked.up = true;
        } else if body.bottom() >= self.height {
            body.y = self.height - body.height;
            body.velocity.y = body.velocity.y.min(0.0);
            blocked.down = true;
        }
    }

    fn slot(&self, handle: BodyHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.body.is_some())
    }

    fn slot_mut(&mut self, handle: BodyHandle) -> Option<&mut Slot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.body.is_some())
    }
}

impl Index<BodyHandle> for PhysicsWorld {
    type Output = Body;

    fn index(&self, handle: BodyHandle) -> &Body {
        self.get(handle)
            .unwrap_or_else(|| panic!("stale body handle {:?}", handle))
    }
}

impl IndexMut<BodyHandle> for PhysicsWorld {
    fn index_mut(&mut self, handle: BodyHandle) -> &mut Body {
        self.get_mut(handle)
            .unwrap_or_else(|| panic!("stale body handle {:?}", handle))
    }
}
