//! Headless wave runner.
//!
//! Plays the host's part: walks enemies down their lanes, picks tower
//! targets, flies projectiles and feeds overlaps into the engine.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use glam::Vec2;
use serde::Serialize;
use tracing::{debug, info};

use rampart_combat::{dispatch, AttackError, CombatEngine, CombatEvent, EventHandler};
use rampart_common::{EntityId, ObjectId, Timestamp};

use crate::scenario::WaveScenario;

/// Distance at which a projectile counts as touching its target.
const HIT_RADIUS: f32 = 0.5;

/// Outcome of one wave.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaveSummary {
    /// Wave name
    pub wave: String,
    /// Simulated seconds
    pub duration_secs: f64,
    /// Enemies spawned
    pub spawned: u32,
    /// Enemies killed
    pub killed: u32,
    /// Enemies that reached the base
    pub leaked: u32,
    /// Damage that reached pools
    pub damage_dealt: f64,
    /// Critical hits
    pub critical_hits: u32,
    /// Triggered defenses by kind
    pub mitigations: BTreeMap<String, u32>,
    /// Status stacks applied
    pub statuses_applied: u32,
    /// Stack conversions
    pub conversions: u32,
    /// Attack instances spawned
    pub projectiles: u32,
    /// Areas of effect spawned
    pub areas: u32,
    /// Pool restored by heals and regen
    pub healed: f64,
}

impl EventHandler for WaveSummary {
    fn handle(&mut self, event: &CombatEvent) {
        match event {
            CombatEvent::Damaged { split, critical, .. } => {
                self.damage_dealt += split.total();
                if *critical {
                    self.critical_hits += 1;
                }
            },
            CombatEvent::Mitigated { mitigation, .. } => {
                *self.mitigations.entry(format!("{mitigation:?}")).or_default() += 1;
            },
            CombatEvent::StatusApplied { .. } => self.statuses_applied += 1,
            CombatEvent::StatusConverted { .. } => self.conversions += 1,
            CombatEvent::AttackSpawned { .. } => self.projectiles += 1,
            CombatEvent::AreaOfEffectSpawned { .. } => self.areas += 1,
            CombatEvent::Healed { amount, .. } => self.healed += amount,
            _ => {},
        }
    }
}

/// An enemy walking its lane.
#[derive(Debug, Clone, Copy)]
struct Walker {
    speed: f32,
}

/// Drives one wave through a combat engine.
#[derive(Debug)]
pub struct WaveRunner {
    engine: CombatEngine,
    scenario: WaveScenario,
    towers: Vec<EntityId>,
    enemies: BTreeMap<EntityId, Walker>,
    projectiles: BTreeMap<ObjectId, EntityId>,
    overlaps: BTreeSet<(ObjectId, EntityId)>,
    summary: WaveSummary,
}

impl WaveRunner {
    /// Place the towers and get ready to run.
    pub fn new(mut engine: CombatEngine, scenario: WaveScenario) -> Result<Self> {
        let mut towers = Vec::with_capacity(scenario.towers.len());
        for tower in &scenario.towers {
            towers.push(engine.spawn_entity(&tower.entity, tower.position())?);
        }
        let summary = WaveSummary {
            wave: scenario.name.clone(),
            ..WaveSummary::default()
        };
        Ok(Self {
            engine,
            scenario,
            towers,
            enemies: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            overlaps: BTreeSet::new(),
            summary,
        })
    }

    /// Run until every enemy is resolved or time runs out.
    pub fn run(mut self) -> Result<WaveSummary> {
        let step = self.scenario.step_secs();
        let schedule: Vec<(f64, String, f32, f32)> = self
            .scenario
            .spawn_schedule()
            .into_iter()
            .map(|(at, group)| (at, group.entity.clone(), group.lane_y, group.speed))
            .collect();
        let mut pending = schedule.into_iter().peekable();

        let mut now = 0.0;
        while now <= self.scenario.max_secs {
            while let Some((_, name, lane_y, speed)) = pending.next_if(|(at, ..)| *at <= now) {
                let id = self
                    .engine
                    .spawn_entity(&name, Vec2::new(self.scenario.spawn_x, lane_y))?;
                self.enemies.insert(id, Walker { speed });
                self.summary.spawned += 1;
            }

            self.engine.tick(Timestamp::from_secs(now));
            self.walk(step as f32);
            self.aim_and_fire();
            self.fly(step as f32);
            self.touch_areas();
            self.collect_dead();
            dispatch(self.engine.events(), &mut self.summary);

            if pending.peek().is_none() && self.enemies.is_empty() {
                break;
            }
            now += step;
        }

        self.summary.duration_secs = now;
        info!(
            "Wave '{}' finished after {:.1}s: {} killed, {} leaked",
            self.summary.wave, now, self.summary.killed, self.summary.leaked
        );
        Ok(self.summary)
    }

    fn walk(&mut self, dt: f32) {
        let base_x = self.scenario.base_x;
        let mut leaked = Vec::new();
        for (id, walker) in &self.enemies {
            let Some(entity) = self.engine.world_mut().entity_mut(*id) else {
                continue;
            };
            if !entity.is_alive() || !entity.can_move {
                entity.is_moving = false;
                continue;
            }
            entity.is_moving = true;
            entity.position.x -= walker.speed * dt;
            if entity.position.x <= base_x {
                leaked.push(*id);
            }
        }
        for id in leaked {
            debug!("{} reached the base", id);
            self.enemies.remove(&id);
            self.engine.despawn_entity(id);
            self.summary.leaked += 1;
        }
    }

    fn aim_and_fire(&mut self) {
        for tower in self.towers.clone() {
            let Some(target) = self.pick_target(tower) else {
                continue;
            };
            let Some(entity) = self.engine.world_mut().entity_mut(tower) else {
                continue;
            };
            entity.target = Some(target);
            let slots = u16::try_from(entity.attacks.len()).unwrap_or(u16::MAX);

            for slot in 0..slots {
                match self.engine.use_attack(tower, slot) {
                    Ok(objects) => {
                        for object in objects {
                            self.projectiles.insert(object, target);
                        }
                    },
                    Err(AttackError::OnCooldown { .. } | AttackError::OutOfRange(_)) => {},
                    Err(e) => debug!("{} held fire: {e}", tower),
                }
            }
        }
    }

    /// Nearest living enemy to a tower.
    fn pick_target(&self, tower: EntityId) -> Option<EntityId> {
        let world = self.engine.world();
        let origin = world.entity(tower)?.position;
        self.enemies
            .keys()
            .filter_map(|id| world.entity(*id))
            .filter(|e| e.is_alive())
            .min_by(|a, b| {
                a.position
                    .distance_squared(origin)
                    .total_cmp(&b.position.distance_squared(origin))
            })
            .map(|e| e.id)
    }

    fn fly(&mut self, dt: f32) {
        let speed = self.scenario.projectile_speed;
        let mut arrived = Vec::new();
        let mut lost = Vec::new();

        for (object, target) in &self.projectiles {
            let goal = self
                .engine
                .world()
                .entity(*target)
                .filter(|e| e.is_alive())
                .map(|e| e.position);
            let Some(state) = self
                .engine
                .world_mut()
                .object_mut(*object)
                .and_then(|o| o.attack_state_mut())
            else {
                lost.push(*object);
                continue;
            };
            let Some(goal) = goal else {
                lost.push(*object);
                continue;
            };
            let to_goal = goal - state.position;
            let travel = speed * dt;
            if to_goal.length() <= travel + HIT_RADIUS {
                state.position = goal;
                arrived.push((*object, *target));
            } else {
                state.position += to_goal.normalize_or_zero() * travel;
            }
        }

        // Homing shots only ever meet their own target, so one contact retires them
        for (object, target) in arrived {
            self.engine.on_overlap_start(object, target);
            self.projectiles.remove(&object);
            self.engine.despawn_object(object);
        }
        for object in lost {
            self.projectiles.remove(&object);
            self.engine.despawn_object(object);
        }
    }

    fn touch_areas(&mut self) {
        let world = self.engine.world();
        let mut inside = BTreeSet::new();
        for area in world.objects() {
            let Some(state) = area.area_state() else {
                continue;
            };
            for id in self.enemies.keys() {
                let Some(enemy) = world.entity(*id).filter(|e| e.is_alive()) else {
                    continue;
                };
                if f64::from(enemy.position.distance(state.position)) <= state.radius {
                    inside.insert((area.id, *id));
                }
            }
        }

        let entered: Vec<_> = inside.difference(&self.overlaps).copied().collect();
        let left: Vec<_> = self.overlaps.difference(&inside).copied().collect();
        for (area, enemy) in left {
            self.engine.on_overlap_end(area, enemy);
        }
        for (area, enemy) in entered {
            self.engine.on_overlap_start(area, enemy);
        }
        self.overlaps = inside;
    }

    fn collect_dead(&mut self) {
        let dead: Vec<EntityId> = self
            .enemies
            .keys()
            .filter(|id| {
                self.engine
                    .world()
                    .entity(**id)
                    .map_or(true, |e| !e.is_alive())
            })
            .copied()
            .collect();
        for id in dead {
            self.enemies.remove(&id);
            self.overlaps.retain(|(_, enemy)| *enemy != id);
            self.engine.despawn_entity(id);
            self.summary.killed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_combat::{CombatCatalog, CombatConfig, FastRng};

    const CONTENT: &str = include_str!("../content/catalog.ron");
    const WAVE: &str = include_str!("../content/wave.ron");

    fn runner(wave: WaveScenario) -> WaveRunner {
        let catalog = CombatCatalog::from_ron(CONTENT).expect("valid content");
        let engine = CombatEngine::new(CombatConfig::default(), catalog, Box::new(FastRng::seeded(11)))
            .expect("engine");
        WaveRunner::new(engine, wave).expect("towers placed")
    }

    #[test]
    fn test_bundled_wave_accounts_for_every_enemy() {
        let wave = WaveScenario::from_ron(WAVE).expect("valid wave");
        let expected = wave.enemy_count();
        let summary = runner(wave).run().expect("runs");
        assert_eq!(summary.spawned, expected);
        assert_eq!(summary.killed + summary.leaked, expected);
        assert!(summary.projectiles > 0);
        assert!(summary.damage_dealt > 0.0);
    }

    #[test]
    fn test_undefended_lane_leaks_everything() {
        let mut wave = WaveScenario::from_ron(WAVE).expect("valid wave");
        wave.towers.clear();
        let expected = wave.enemy_count();
        let summary = runner(wave).run().expect("runs");
        assert_eq!(summary.leaked, expected);
        assert_eq!(summary.killed, 0);
    }

    #[test]
    fn test_unknown_tower_is_an_error() {
        let mut wave = WaveScenario::from_ron(WAVE).expect("valid wave");
        wave.towers[0].entity = "nonexistent".to_string();
        let catalog = CombatCatalog::from_ron(CONTENT).expect("valid content");
        let engine = CombatEngine::new(CombatConfig::default(), catalog, Box::new(FastRng::seeded(1)))
            .expect("engine");
        assert!(WaveRunner::new(engine, wave).is_err());
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let summary = WaveSummary {
            wave: "w".to_string(),
            killed: 3,
            ..WaveSummary::default()
        };
        let json = serde_json::to_value(&summary).expect("serializes");
        assert_eq!(json["killed"], 3);
        assert_eq!(json["wave"], "w");
    }
}
