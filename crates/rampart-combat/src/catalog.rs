//! Combat content catalog.
//!
//! This module provides:
//! - RON content files with stat templates, status effects, attacks and entities
//! - Load-time validation of every cross reference
//! - Construction of attack loadouts and entities from templates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use rampart_common::{RampartResult, TemplateError};

use crate::attack::{AttackLoadout, AttackSettings};
use crate::container::{StatContainer, StatTemplate};
use crate::damage::{AreaOfEffectTemplate, DamageProfile, DamageTypes};
use crate::stat::StatId;
use crate::status::{StatusEffectDefinition, StatusEffectId, StatusEffectLibrary};
use crate::vitals::Pool;
use crate::world::CombatEntity;

// ============================================================================
// Content Files
// ============================================================================

/// Damage flags shared by attacks and areas of effect.
#[derive(Debug, Clone, Copy)]
struct DamageSpec<'a> {
    damage_types: DamageTypes,
    is_physical: bool,
    is_blockable: bool,
    ignores_shields: bool,
    does_damage_over_time: bool,
    heals: Option<Pool>,
    status_effects: &'a [StatusEffectId],
}

/// Area of effect an attack can spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaOfEffectSpec {
    /// Area name
    pub name: String,
    /// Stat template of the area
    pub stat_template: String,
    /// Damage types
    #[serde(default)]
    pub damage_types: DamageTypes,
    /// Physical damage
    #[serde(default)]
    pub is_physical: bool,
    /// Skips energy shields
    #[serde(default)]
    pub ignores_shields: bool,
    /// Ticks overlapping targets
    #[serde(default)]
    pub does_damage_over_time: bool,
    /// Heals instead of damaging
    #[serde(default)]
    pub heals: Option<Pool>,
    /// Status effects inflicted on hit
    #[serde(default)]
    pub status_effects: Vec<StatusEffectId>,
    /// Radius; defaults to the template's `AreaOfEffectRadiusValue`
    #[serde(default)]
    pub radius: Option<f64>,
    /// Spawn whenever the attack lands a hit
    #[serde(default)]
    pub spawns_when_attack_hits: bool,
    /// Seconds until the area despawns
    #[serde(default)]
    pub lifetime_secs: Option<f64>,
}

impl AreaOfEffectSpec {
    fn damage(&self) -> DamageSpec<'_> {
        DamageSpec {
            damage_types: self.damage_types,
            is_physical: self.is_physical,
            is_blockable: false,
            ignores_shields: self.ignores_shields,
            does_damage_over_time: self.does_damage_over_time,
            heals: self.heals,
            status_effects: &self.status_effects,
        }
    }
}

/// Attack template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackSpec {
    /// Attack name
    pub name: String,
    /// Stat template of the attack
    pub stat_template: String,
    /// Damage types
    #[serde(default)]
    pub damage_types: DamageTypes,
    /// Physical damage
    #[serde(default)]
    pub is_physical: bool,
    /// Blockable damage
    #[serde(default)]
    pub is_blockable: bool,
    /// Skips energy shields
    #[serde(default)]
    pub ignores_shields: bool,
    /// Ticks overlapping targets
    #[serde(default)]
    pub does_damage_over_time: bool,
    /// Heals instead of damaging
    #[serde(default)]
    pub heals: Option<Pool>,
    /// Status effects inflicted on hit
    #[serde(default)]
    pub status_effects: Vec<StatusEffectId>,
    /// Area of effect carried by the attack
    #[serde(default)]
    pub area_of_effect: Option<AreaOfEffectSpec>,
    /// Flight settings
    #[serde(default)]
    pub settings: AttackSettings,
}

impl AttackSpec {
    fn damage(&self) -> DamageSpec<'_> {
        DamageSpec {
            damage_types: self.damage_types,
            is_physical: self.is_physical,
            is_blockable: self.is_blockable,
            ignores_shields: self.ignores_shields,
            does_damage_over_time: self.does_damage_over_time,
            heals: self.heals,
            status_effects: &self.status_effects,
        }
    }
}

/// Entity template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Entity name
    pub name: String,
    /// Stat template of the entity
    pub stat_template: String,
    /// Attack names, in slot order
    #[serde(default)]
    pub attacks: Vec<String>,
}

/// On-disk layout of a content file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    /// Stat templates
    pub stat_templates: Vec<StatTemplate>,
    /// Status effect definitions
    pub status_effects: Vec<StatusEffectDefinition>,
    /// Attack templates
    pub attacks: Vec<AttackSpec>,
    /// Entity templates
    pub entities: Vec<EntitySpec>,
}

// ============================================================================
// Catalog
// ============================================================================

/// Validated combat content.
#[derive(Debug, Clone, Default)]
pub struct CombatCatalog {
    templates: BTreeMap<String, Arc<StatTemplate>>,
    library: StatusEffectLibrary,
    attacks: BTreeMap<String, AttackSpec>,
    entities: BTreeMap<String, EntitySpec>,
}

impl CombatCatalog {
    /// Validate a parsed content file.
    pub fn new(file: CatalogFile) -> Result<Self, TemplateError> {
        let mut templates = BTreeMap::new();
        for template in file.stat_templates {
            template.validate()?;
            let name = template.name.clone();
            if templates.insert(name.clone(), Arc::new(template)).is_some() {
                return Err(TemplateError::DuplicateTemplate(name));
            }
        }

        let library = StatusEffectLibrary::new(file.status_effects)?;

        let mut attacks = BTreeMap::new();
        for attack in file.attacks {
            let context = format!("attack '{}'", attack.name);
            require_template(&templates, &attack.stat_template, &context)?;
            require_effects(&library, attack.damage(), &context)?;
            if let Some(area) = &attack.area_of_effect {
                let context = format!("area of effect '{}'", area.name);
                require_template(&templates, &area.stat_template, &context)?;
                require_effects(&library, area.damage(), &context)?;
            }
            let name = attack.name.clone();
            if attacks.insert(name.clone(), attack).is_some() {
                return Err(TemplateError::DuplicateAttack(name));
            }
        }

        let mut entities = BTreeMap::new();
        for entity in file.entities {
            let context = format!("entity '{}'", entity.name);
            require_template(&templates, &entity.stat_template, &context)?;
            for attack in &entity.attacks {
                if !attacks.contains_key(attack) {
                    return Err(TemplateError::UnknownTemplate {
                        name: attack.clone(),
                        referenced_by: context,
                    });
                }
            }
            let name = entity.name.clone();
            if entities.insert(name.clone(), entity).is_some() {
                return Err(TemplateError::DuplicateTemplate(name));
            }
        }

        Ok(Self {
            templates,
            library,
            attacks,
            entities,
        })
    }

    /// Parse and validate RON content.
    pub fn from_ron(text: &str) -> Result<Self, TemplateError> {
        let file: CatalogFile = ron::from_str(text).map_err(|e| TemplateError::Parse(e.to_string()))?;
        Self::new(file)
    }

    /// Load and validate a RON content file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> RampartResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let catalog = Self::from_ron(&text)?;
        info!(
            "Loaded {} templates, {} status effects, {} attacks, {} entities from {}",
            catalog.templates.len(),
            catalog.library.len(),
            catalog.attacks.len(),
            catalog.entities.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Status effect definitions.
    #[must_use]
    pub const fn library(&self) -> &StatusEffectLibrary {
        &self.library
    }

    /// Look up a stat template.
    #[must_use]
    pub fn template(&self, name: &str) -> Option<&Arc<StatTemplate>> {
        self.templates.get(name)
    }

    /// Look up an attack template.
    #[must_use]
    pub fn attack(&self, name: &str) -> Option<&AttackSpec> {
        self.attacks.get(name)
    }

    /// Attack names in order.
    pub fn attack_names(&self) -> impl Iterator<Item = &str> {
        self.attacks.keys().map(String::as_str)
    }

    /// Entity names in order.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Fresh stats seeded from a named template.
    pub fn stats(&self, template: &str) -> Result<StatContainer, TemplateError> {
        self.templates
            .get(template)
            .map(|t| StatContainer::from_template(Arc::clone(t)))
            .ok_or_else(|| TemplateError::UnknownTemplate {
                name: template.to_string(),
                referenced_by: "catalog lookup".to_string(),
            })
    }

    /// Build a loadout from an attack template, with its own stat copies.
    pub fn loadout(&self, name: &str) -> Result<AttackLoadout, TemplateError> {
        let spec = self.attacks.get(name).ok_or_else(|| TemplateError::UnknownTemplate {
            name: name.to_string(),
            referenced_by: "loadout".to_string(),
        })?;

        let mut profile = self.profile(&spec.stat_template, spec.damage())?;
        if let Some(area) = &spec.area_of_effect {
            let area_profile = self.profile(&area.stat_template, area.damage())?;
            let radius = area
                .radius
                .unwrap_or_else(|| area_profile.stats.total(StatId::AreaOfEffectRadiusValue));
            profile = profile.with_area_of_effect(AreaOfEffectTemplate {
                name: area.name.clone(),
                profile: area_profile,
                radius,
                spawns_when_attack_hits: area.spawns_when_attack_hits,
                lifetime_secs: area.lifetime_secs,
            });
        }

        debug!("Built loadout '{}'", name);
        Ok(AttackLoadout::new(name, profile, spec.settings))
    }

    /// Build an entity from an entity template.
    pub fn entity(&self, name: &str) -> Result<CombatEntity, TemplateError> {
        let spec = self.entities.get(name).ok_or_else(|| TemplateError::UnknownTemplate {
            name: name.to_string(),
            referenced_by: "entity spawn".to_string(),
        })?;
        let mut entity = CombatEntity::new(spec.name.clone(), self.stats(&spec.stat_template)?);
        for attack in &spec.attacks {
            entity.attacks.push(self.loadout(attack)?);
        }
        Ok(entity)
    }

    fn profile(&self, template: &str, spec: DamageSpec<'_>) -> Result<DamageProfile, TemplateError> {
        let mut profile = DamageProfile::new(self.stats(template)?, spec.damage_types);
        profile.is_physical = spec.is_physical;
        profile.is_blockable = spec.is_blockable;
        profile.ignores_shields = spec.ignores_shields;
        profile.does_damage_over_time = spec.does_damage_over_time;
        profile.heals = spec.heals;
        for id in spec.status_effects {
            let definition = self.library.get(*id).ok_or_else(|| TemplateError::UnknownStatusEffect {
                effect: id.to_string(),
                referenced_by: format!("template '{template}'"),
            })?;
            profile.status_effects.push(definition.clone());
        }
        Ok(profile)
    }
}

fn require_template(
    templates: &BTreeMap<String, Arc<StatTemplate>>,
    name: &str,
    context: &str,
) -> Result<(), TemplateError> {
    if templates.contains_key(name) {
        Ok(())
    } else {
        Err(TemplateError::UnknownTemplate {
            name: name.to_string(),
            referenced_by: context.to_string(),
        })
    }
}

fn require_effects(library: &StatusEffectLibrary, spec: DamageSpec<'_>, context: &str) -> Result<(), TemplateError> {
    if spec.damage_types.is_unset() && spec.heals.is_none() {
        return Err(TemplateError::Invalid {
            context: context.to_string(),
            reason: "no damage types".to_string(),
        });
    }
    for id in spec.status_effects {
        if library.get(*id).is_none() {
            return Err(TemplateError::UnknownStatusEffect {
                effect: id.to_string(),
                referenced_by: context.to_string(),
            });
        }
    }
    Ok(())
}
