//! Prompt construction for agent conversations and player chat.
//!
//! Templates use `{placeholder}` slots filled by [`render_template`]. Both
//! prompts ask for bare JSON: agent-to-agent exchanges as an ordered array
//! of turns, player replies as an object keyed by agent name.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::drive::TopicKind;
use crate::memory::MemoryBook;
use crate::personality::{Mood, PersonalityCatalog};
use crate::player::PlayerFacts;
use crate::social::ConversationRequest;
use crate::types::{ActivityMap, truncate_chars};

/// Activity shown for agents the activity map does not cover.
pub const DEFAULT_ACTIVITY: &str = "resting";

/// Memory context budget per agent in conversation prompts, in chars.
const CONVERSATION_MEMORY_CHARS: usize = 200;
/// Memory context budget per agent in player prompts, in chars.
const PLAYER_MEMORY_CHARS: usize = 150;

/// A system prompt plus the user message that goes with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    /// Instructions.
    pub system: String,
    /// The request itself.
    pub user: String,
}

/// One line of recent chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    /// Player or agent name.
    pub sender: String,
    /// What they said.
    pub text: String,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Agent-to-agent conversation instructions.
pub const CONVERSATION_SYSTEM: &str = r#"Eres el narrador de NPCs en Sunnyside World. Genera una conversación SECUENCIAL entre NPCs.

PARTICIPANTES:
{participants}

ACTIVIDADES: {activities}

FORMATO: Array JSON de turnos en ORDEN CRONOLÓGICO. Cada turno es un mensaje de un NPC.
[{"npc":"Nombre","msg":"texto"},{"npc":"Nombre2","msg":"texto"},...]

REGLAS CRÍTICAS:
- Genera entre 2 y 4 turnos SECUENCIALES.
- Un NPC puede hablar más de una vez si la conversación lo requiere.
- {initiator} SIEMPRE habla primero (turno 1).
- Cada turno es una REACCIÓN al turno anterior. No pueden responder a algo que no se ha dicho aún.
- Max 50 caracteres por mensaje. Corto y natural.
- Mantener personalidad: {styles}.
- La conversación debe tener SENTIDO de principio a fin. Cada mensaje conecta con el anterior.
- Sin emojis. Español. JSON puro sin markdown."#;

/// Agent-to-agent conversation request.
pub const CONVERSATION_USER: &str = r"[Conversación NPC-NPC]
{topic_hint}
{initiator} inicia hablando con/cerca de {target}.
Participantes cercanos: {participant_names}.
Genera 2-4 turnos secuenciales. Array JSON puro. {initiator} habla primero.";

/// Player chat instructions.
pub const PLAYER_SYSTEM: &str = r"Eres el narrador de {agent_count} NPCs en Sunnyside World. Responde SOLO JSON puro, sin texto extra.

{agents}

FORMATO OBLIGATORIO (JSON puro, sin markdown):
{format_example}

REGLAS DE CHAT REALISTA:
- Solo NPCs marcados ✓CERCA pueden responder. Los demás = null obligatorio.
- Solo 1-2 NPCs responden normalmente. No todos hablan siempre.
- Si el jugador HABLA CON un NPC específico, ESE NPC responde primero.
- Los demás pueden reaccionar/añadir si es natural, pero no siempre.
- MÁXIMO 55 caracteres por frase. Ultra-corto como chat real.
- Español. Sin emojis. En personaje SIEMPRE.
- {styles}
- No dicen que son IA. Revelan personalidad gradualmente.
- Pueden preguntar al jugador sobre su vida.
- USA los recuerdos de cada NPC cuando sea relevante.
- Pueden reaccionar a lo que OTRO NPC dijo antes (conversación encadenada).
- A veces un NPC puede estar de acuerdo o discrepar con otro NPC.
- Pueden referirse a lo que están haciendo en ese momento.";

/// Fill `{key}` placeholders in `template`.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Prompt for an agent-initiated group conversation.
#[must_use]
pub fn conversation_prompt(
    request: &ConversationRequest,
    catalog: &PersonalityCatalog,
    memory: &MemoryBook,
    activities: &ActivityMap,
) -> Prompt {
    let initiator = request.initiator.as_str();
    let participants = &request.participants;

    let descriptions = participants
        .iter()
        .filter_map(|name| catalog.get(name))
        .map(|profile| {
            let mut line = format!(
                "{}({},{}): {}",
                profile.name,
                profile.kind,
                profile.role,
                profile.signature_quirk()
            );
            let context = memory.context_for(&profile.name, participants);
            if !context.is_empty() {
                line.push_str("\n  Recuerdos: ");
                line.push_str(truncate_chars(&context, CONVERSATION_MEMORY_CHARS));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    let activity_line = participants
        .iter()
        .map(|n| format!("{n}: {}", activities.get(n).map_or(DEFAULT_ACTIVITY, String::as_str)))
        .collect::<Vec<_>>()
        .join(", ");

    let styles = catalog
        .iter()
        .map(|p| format!("{}={}", p.name, p.style))
        .collect::<Vec<_>>()
        .join(", ");

    let topic = &request.topic;
    let topic_hint = match topic.kind {
        TopicKind::Memory => format!("{initiator} recuerda algo: \"{}\" y quiere comentarlo.", topic.text),
        TopicKind::Interest => format!("{initiator} quiere hablar de: {}.", topic.text),
        TopicKind::Activity => format!("{initiator} comenta sobre lo que están haciendo."),
        TopicKind::Environmental => format!("{initiator} comenta: \"{}\".", topic.text),
    };

    let system = render_template(
        CONVERSATION_SYSTEM,
        &[
            ("participants", &descriptions),
            ("activities", &activity_line),
            ("initiator", initiator),
            ("styles", &styles),
        ],
    );
    let user = render_template(
        CONVERSATION_USER,
        &[
            ("topic_hint", &topic_hint),
            ("initiator", initiator),
            ("target", &request.target),
            ("participant_names", &participants.join(", ")),
        ],
    );
    Prompt { system, user }
}

/// Everything the player prompt needs besides the catalog and memories.
#[derive(Debug, Clone, Copy)]
pub struct PlayerScene<'a> {
    /// Who is talking.
    pub player: &'a str,
    /// What they said.
    pub message: &'a str,
    /// Agents close enough to hear, nearest first.
    pub nearby: &'a [String],
    /// Current activity per agent.
    pub activities: &'a ActivityMap,
    /// Current mood per agent.
    pub moods: &'a BTreeMap<String, Mood>,
    /// Addressing instruction appended to the message, may be empty.
    pub addressing_hint: &'a str,
    /// Recent chat, oldest first.
    pub recent: &'a [ChatLine],
    /// What agents know about the player.
    pub facts: &'a PlayerFacts,
}

/// Prompt for a player message to the whole village.
///
/// Every agent is listed with a near/far flag; only near agents may answer.
#[must_use]
pub fn player_prompt(scene: &PlayerScene<'_>, catalog: &PersonalityCatalog, memory: &MemoryBook) -> Prompt {
    let mut context_people = Vec::with_capacity(scene.nearby.len() + 1);
    context_people.push(scene.player.to_string());
    context_people.extend(scene.nearby.iter().cloned());

    let agents = catalog
        .iter()
        .map(|profile| {
            let name = profile.name.as_str();
            let activity = scene.activities.get(name).map_or(DEFAULT_ACTIVITY, String::as_str);
            let mood = scene
                .moods
                .get(name)
                .map(|m| format!(" Ánimo:{},social:{}", m.happiness_label(), m.social_label()))
                .unwrap_or_default();
            let near = scene.nearby.iter().any(|n| n == name);
            let flag = if near { "✓CERCA" } else { "✗LEJOS" };
            let mut line = format!(
                "{name}({},{}): {}.{mood} [{activity}] {flag}",
                profile.kind,
                profile.role,
                profile.signature_quirk()
            );
            if near {
                let context = memory.context_for(name, &context_people);
                if !context.is_empty() {
                    line.push_str("\n  Recuerdos: ");
                    line.push_str(truncate_chars(&context, PLAYER_MEMORY_CHARS));
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    let format_example = format!(
        "{{{}}}",
        catalog
            .iter()
            .enumerate()
            .map(|(i, p)| if i == 0 {
                format!("\"{}\":\"texto\"", p.name)
            } else {
                format!("\"{}\":null", p.name)
            })
            .collect::<Vec<_>>()
            .join(",")
    );
    let styles = catalog
        .iter()
        .map(|p| format!("{}: {}", p.name, p.style))
        .collect::<Vec<_>>()
        .join(". ");

    let system = render_template(
        PLAYER_SYSTEM,
        &[
            ("agent_count", &catalog.len().to_string()),
            ("agents", &agents),
            ("format_example", &format_example),
            ("styles", &styles),
        ],
    );
    Prompt {
        system,
        user: player_user_message(scene),
    }
}

/// `[Reciente]` chat, the message with its addressing hint, then the
/// known player facts.
#[must_use]
pub fn player_user_message(scene: &PlayerScene<'_>) -> String {
    let memory = if scene.facts.is_empty() {
        String::new()
    } else {
        format!("\n[Recuerdas del jugador: {}]", scene.facts.summary())
    };
    let line = format!("{}: {}{}{memory}", scene.player, scene.message, scene.addressing_hint);
    if scene.recent.is_empty() {
        return line;
    }
    let recent = scene
        .recent
        .iter()
        .map(|l| format!("{}: {}", l.sender, l.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!("[Reciente]:\n{recent}\n\n{line}")
}
