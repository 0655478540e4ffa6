use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::session::{PlayOutcome, SessionHandle},
    bot::RitmoBot,
    error::PlayerError,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &RitmoBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(
            ctx,
            &command,
            embeds::create_error_embed("❌ Error", "Este comando solo funciona dentro de un servidor"),
        )
        .await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "history" => handle_history(ctx, &command, bot, guild_id).await,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await,
        "shuffle" => handle_shuffle(ctx, &command, bot, guild_id).await,
        "loop" => handle_loop(ctx, &command, bot, guild_id).await,
        "volume" => handle_volume(ctx, &command, bot, guild_id).await,
        "remove" => handle_remove(ctx, &command, bot, guild_id).await,
        "clear" => handle_clear(ctx, &command, bot, guild_id).await,
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(ctx, &command, bot, guild_id).await,
        "saveplaylist" => handle_saveplaylist(ctx, &command, bot, guild_id).await,
        "loadplaylist" => handle_loadplaylist(ctx, &command, bot, guild_id).await,
        _ => {
            respond(
                ctx,
                &command,
                embeds::create_error_embed("❌ Error", "Comando no reconocido"),
            )
            .await
        }
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(query) = option_str(command, "query") else {
        return respond(
            ctx,
            command,
            embeds::create_error_embed("❌ Error", "Falta el término de búsqueda"),
        )
        .await;
    };
    let query = query.to_string();

    // Defer: la resolución puede tomar varios segundos
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let voice_channel = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel) => channel,
        Err(msg) => {
            return edit(
                ctx,
                command,
                embeds::create_error_embed("🔇 Canal de Voz Requerido", msg),
            )
            .await;
        }
    };

    if let Some(msg) = voice_mismatch(ctx, guild_id, voice_channel).await {
        return edit(ctx, command, embeds::create_error_embed("🔇 Canal Equivocado", msg)).await;
    }

    let track = match bot.resolver.resolve(&query, command.user.id).await {
        Ok(track) => track,
        Err(e) => {
            return edit(
                ctx,
                command,
                embeds::create_error_embed("❌ Error de Búsqueda", &e.to_string()),
            )
            .await;
        }
    };

    let session = match bot
        .ensure_session(ctx, guild_id, voice_channel, command.channel_id)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            return edit(
                ctx,
                command,
                embeds::create_error_embed("❌ Error de Conexión", &e.to_string()),
            )
            .await;
        }
    };

    match session.play(track).await {
        Ok(PlayOutcome::Started(track)) => {
            edit(ctx, command, embeds::create_now_playing_embed(&track)).await
        }
        Ok(PlayOutcome::Queued { track, position }) => {
            edit(ctx, command, embeds::create_track_queued_embed(&track, position)).await
        }
        Err(e) => {
            edit(
                ctx,
                command,
                embeds::create_error_embed("❌ Error de Reproducción", &e.to_string()),
            )
            .await
        }
    }
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.pause().await {
        Ok(()) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("⏸️ Pausado", "Reproducción pausada"),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.resume().await {
        Ok(()) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("▶️ Reanudado", "Reproducción reanudada"),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.skip().await {
        Ok(track) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed(
                    "⏭️ Saltado",
                    &format!("Saltando **{}**", track.title()),
                ),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.stop().await {
        Ok(()) => {
            respond(
                ctx,
                command,
                embeds::create_warning_embed(
                    "⏹️ Detenido",
                    "Reproducción detenida y cola limpiada",
                ),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };
    let page = option_int(command, "page").unwrap_or(1).max(1) as usize;

    match session.queue_view().await {
        Ok(view) => respond(ctx, command, embeds::create_queue_embed(&view, page)).await,
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_history(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };
    let page = option_int(command, "page").unwrap_or(1).max(1) as usize;

    match session.history().await {
        Ok(history) => respond(ctx, command, embeds::create_history_embed(&history, page)).await,
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.now_playing().await {
        Ok(Some(view)) => respond(ctx, command, embeds::create_player_status_embed(&view)).await,
        Ok(None) => {
            respond(
                ctx,
                command,
                embeds::create_warning_embed("🔇 Nada Sonando", "No hay ninguna canción en reproducción"),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_shuffle(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.shuffle().await {
        Ok(count) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed(
                    "🔀 Cola Mezclada",
                    &format!("Se mezclaron {count} canciones en espera"),
                ),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_loop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.toggle_loop().await {
        Ok(true) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("🔂 Repetición", "La canción actual se repetirá"),
            )
            .await
        }
        Ok(false) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("➡️ Repetición", "Repetición desactivada"),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_volume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(level) = option_int(command, "nivel") else {
        return respond(
            ctx,
            command,
            embeds::create_error_embed("❌ Error", "Falta el nivel de volumen"),
        )
        .await;
    };

    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    if level < 0 {
        return respond(
            ctx,
            command,
            embeds::create_error_embed("❌ Volumen Inválido", "El volumen debe estar entre 0 y 200"),
        )
        .await;
    }

    match session.set_volume(level as u32).await {
        Ok(_) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("🔊 Volumen", &format!("Volumen ajustado a {level}%")),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_remove(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(position) = option_int(command, "posicion") else {
        return respond(
            ctx,
            command,
            embeds::create_error_embed("❌ Error", "Falta la posición a eliminar"),
        )
        .await;
    };

    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    if position < 1 {
        return respond(
            ctx,
            command,
            embeds::create_error_embed("❌ Posición Inválida", "La posición empieza en 1"),
        )
        .await;
    }

    match session.remove_at(position as usize).await {
        Ok(track) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed(
                    "❌ Canción Eliminada",
                    &format!("**{}** eliminada de la posición {position}", track.title()),
                ),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_clear(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    match session.clear().await {
        Ok(count) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed(
                    "🗑️ Cola Vaciada",
                    &format!("Se eliminaron {count} canciones de la cola"),
                ),
            )
            .await
        }
        Err(e) => respond_player_error(ctx, command, e).await,
    }
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let voice_channel = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel) => channel,
        Err(msg) => {
            return respond(
                ctx,
                command,
                embeds::create_error_embed("🔇 Canal de Voz Requerido", msg),
            )
            .await;
        }
    };

    match bot
        .ensure_session(ctx, guild_id, voice_channel, command.channel_id)
        .await
    {
        Ok(_) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("🔊 Conectado", "Conectado al canal de voz"),
            )
            .await
        }
        Err(e) => {
            respond(
                ctx,
                command,
                embeds::create_error_embed("❌ Error de Conexión", &e.to_string()),
            )
            .await
        }
    }
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.leave_voice_channel(ctx, guild_id).await {
        Ok(()) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed("👋 Desconectado", "Hasta la próxima"),
            )
            .await
        }
        Err(e) => {
            respond(
                ctx,
                command,
                embeds::create_error_embed("❌ Error", &e.to_string()),
            )
            .await
        }
    }
}

async fn handle_saveplaylist(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(name) = option_str(command, "nombre") else {
        return respond(
            ctx,
            command,
            embeds::create_error_embed("❌ Error", "Falta el nombre de la playlist"),
        )
        .await;
    };
    let name = name.to_string();

    let Some(session) = require_session(ctx, command, bot, guild_id).await? else {
        return Ok(());
    };

    let view = match session.queue_view().await {
        Ok(view) => view,
        Err(e) => return respond_player_error(ctx, command, e).await,
    };

    if view.pending.is_empty() {
        return respond(
            ctx,
            command,
            embeds::create_warning_embed("📭 Cola Vacía", "No hay canciones en espera para guardar"),
        )
        .await;
    }

    let storage = bot.storage.lock().await;
    match storage.save(command.user.id, &name, &view.pending).await {
        Ok(saved) => {
            respond(
                ctx,
                command,
                embeds::create_info_embed(
                    "💾 Playlist Guardada",
                    &format!("**{name}** guardada con {saved} canciones"),
                ),
            )
            .await
        }
        Err(e) => {
            respond(
                ctx,
                command,
                embeds::create_error_embed("❌ Error al Guardar", &e.to_string()),
            )
            .await
        }
    }
}

async fn handle_loadplaylist(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(name) = option_str(command, "nombre") else {
        return respond(
            ctx,
            command,
            embeds::create_error_embed("❌ Error", "Falta el nombre de la playlist"),
        )
        .await;
    };
    let name = name.to_string();

    // Defer: cada entrada se vuelve a resolver por red
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let playlist = {
        let storage = bot.storage.lock().await;
        match storage.load(command.user.id, &name).await {
            Ok(playlist) => playlist,
            Err(e) => {
                return edit(
                    ctx,
                    command,
                    embeds::create_error_embed("❌ Playlist No Encontrada", &e.to_string()),
                )
                .await;
            }
        }
    };

    let voice_channel = match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel) => channel,
        Err(msg) => {
            return edit(
                ctx,
                command,
                embeds::create_error_embed("🔇 Canal de Voz Requerido", msg),
            )
            .await;
        }
    };

    let session = match bot
        .ensure_session(ctx, guild_id, voice_channel, command.channel_id)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            return edit(
                ctx,
                command,
                embeds::create_error_embed("❌ Error de Conexión", &e.to_string()),
            )
            .await;
        }
    };

    // Cargar una playlist reemplaza la cola en espera
    let _ = session.clear().await;

    let entries: Vec<_> = playlist
        .tracks
        .iter()
        .take(bot.config.max_playlist_size)
        .collect();

    let results = futures::future::join_all(
        entries
            .iter()
            .map(|entry| bot.resolver.resolve(&entry.url, command.user.id)),
    )
    .await;

    // Las entradas que no se pueden resolver se reportan y se saltan; la
    // carga continúa con el resto
    let mut loaded = 0usize;
    let mut failed: Vec<&str> = Vec::new();
    for (entry, result) in entries.iter().zip(results) {
        match result {
            Ok(track) => match session.play(track).await {
                Ok(_) => loaded += 1,
                Err(e) => {
                    warn!("No se pudo encolar '{}': {}", entry.title, e);
                    failed.push(entry.title.as_str());
                }
            },
            Err(e) => {
                warn!("No se pudo resolver '{}': {}", entry.title, e);
                failed.push(entry.title.as_str());
            }
        }
    }

    let mut description = format!(
        "Se cargaron {loaded} de {} canciones de **{}**",
        entries.len(),
        playlist.name
    );
    if !failed.is_empty() {
        let shown: Vec<&str> = failed.iter().take(5).copied().collect();
        description.push_str(&format!(
            "\nFallaron {}: {}{}",
            failed.len(),
            shown.join(", "),
            if failed.len() > shown.len() { ", …" } else { "" }
        ));
    }

    edit(
        ctx,
        command,
        embeds::create_info_embed("📂 Playlist Cargada", &description),
    )
    .await
}

// Funciones auxiliares

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

async fn respond_player_error(
    ctx: &Context,
    command: &CommandInteraction,
    error: PlayerError,
) -> Result<()> {
    respond(
        ctx,
        command,
        embeds::create_error_embed("❌ No Se Pudo", &error.to_string()),
    )
    .await
}

/// Busca la sesión viva de la guild; si no hay, responde el aviso y devuelve
/// `None`
async fn require_session(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> Result<Option<SessionHandle>> {
    match bot.player.session(guild_id) {
        Some(session) => Ok(Some(session)),
        None => {
            respond(
                ctx,
                command,
                embeds::create_warning_embed(
                    "🔇 Sin Sesión",
                    "No hay una sesión de música activa en este servidor",
                ),
            )
            .await?;
            Ok(None)
        }
    }
}

fn user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<ChannelId, &'static str> {
    let Some(guild) = guild_id.to_guild_cached(&ctx.cache) else {
        return Err("No se encontró el servidor en caché");
    };

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or("Debes estar en un canal de voz")
}

/// Si el bot ya está conectado en otro canal de voz, devuelve el motivo del
/// rechazo
async fn voice_mismatch(
    ctx: &Context,
    guild_id: GuildId,
    user_channel: ChannelId,
) -> Option<&'static str> {
    let manager = songbird::get(ctx).await?;
    let call = manager.get(guild_id)?;
    let connected = call.lock().await.current_channel()?;

    if connected != songbird::id::ChannelId::from(user_channel) {
        Some("Debes estar en el mismo canal de voz que el bot")
    } else {
        None
    }
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_int(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}
