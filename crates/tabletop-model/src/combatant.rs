//! The interface the combat engine needs from anything that fights.

/// Operations combat needs from a participant.
///
/// Implemented by [`Character`](crate::Character) and
/// [`Enemy`](crate::Enemy). The engine dispatches through this trait and
/// never inspects the concrete type.
pub trait Combatant {
    /// Name, unique within a session.
    fn name(&self) -> &str;

    fn hit_points(&self) -> i32;

    /// Overwrites current hit points. Implementations decide whether to clamp.
    fn set_hit_points(&mut self, hp: i32);

    fn armor_class(&self) -> i32;

    /// Movement budget granted at the start of each turn.
    fn speed(&self) -> u32;

    /// Attack budget granted at the start of each turn.
    fn actions_per_turn(&self) -> u32;

    /// Added to the d20 when rolling initiative.
    fn initiative_modifier(&self) -> i32;

    /// Damage dice used when an attack doesn't specify its own.
    ///
    /// `None` means the participant fights bare-handed and the engine's
    /// configured unarmed damage applies.
    fn default_damage(&self) -> Option<&str> {
        None
    }

    /// Returns `true` once hit points reach zero or below.
    fn is_down(&self) -> bool {
        self.hit_points() <= 0
    }
}
