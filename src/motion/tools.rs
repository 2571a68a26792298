// src/motion/tools.rs - Tool change: lift, travel, lower, wiggle
use super::geometry::{LiftState, Point};
use super::pen::PenController;
use super::wiggle::wiggle;
use super::{allow_noop, MotionError};

/// Dip the brush into the named station.
///
/// The steps run strictly in order and the active tool is only recorded once the
/// wiggle has finished. An unknown name touches nothing.
pub async fn change_tool(pen: &mut PenController, name: &str) -> Result<String, MotionError> {
    let tool = pen
        .config()
        .tool(name)
        .cloned()
        .ok_or_else(|| MotionError::UnknownTool(name.to_string()))?;

    tracing::info!("Changing to tool: {}", name);
    pen.set_state(LiftState::Lifted, false).await?;
    allow_noop(pen.move_absolute(Point::new(tool.x, tool.y), false).await)?;
    pen.set_state(LiftState::Lowered, false).await?;
    wiggle(pen, tool.wiggle_axis, tool.wiggle_travel, tool.wiggle_iterations).await?;

    pen.set_active_tool(name);
    Ok(format!("Tool changed to {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hardware::LoopbackChannel;
    use std::sync::Arc;

    fn controller() -> (PenController, LoopbackChannel) {
        let channel = LoopbackChannel::new();
        let pen = PenController::new(Arc::new(Config::default()), Arc::new(channel.clone()));
        (pen, channel)
    }

    #[tokio::test(start_paused = true)]
    async fn water1_sequence() {
        let (mut pen, channel) = controller();
        let message = change_tool(&mut pen, "water1").await.unwrap();
        assert_eq!(message, "Tool changed to water1");
        assert_eq!(
            channel.sent(),
            vec![
                // already lifted, so travel starts immediately
                "SM,966,0,2900\r",
                "SP,0\r",
                "SM,250,0,500\r",
                "SM,500,0,-1000\r",
                "SM,500,0,1000\r",
                "SM,500,0,-1000\r",
                "SM,250,0,500\r",
            ]
        );
        let snapshot = pen.snapshot();
        assert_eq!((snapshot.x, snapshot.y, snapshot.state), (0.0, 2900.0, 1));
        assert_eq!(snapshot.tool.as_deref(), Some("water1"));
    }

    #[tokio::test(start_paused = true)]
    async fn lifts_first_when_lowered() {
        let (mut pen, channel) = controller();
        pen.set_state(LiftState::Lowered, true).await.unwrap();
        channel.clear();
        change_tool(&mut pen, "color3").await.unwrap();
        let sent = channel.sent();
        assert_eq!(sent[0], "SP,1\r");
        assert!(sent[1].starts_with("SM,"));
        assert_eq!(sent[2], "SP,0\r");
        // 8 diamond phases plus the return
        assert_eq!(sent.len(), 3 + 9);
        assert_eq!(pen.position(), Point::new(1620.0, 2950.0));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_tool_leaves_pen_untouched() {
        let (mut pen, channel) = controller();
        let before = pen.snapshot();
        let err = change_tool(&mut pen, "nonexistent").await.unwrap_err();
        assert!(matches!(err, MotionError::UnknownTool(ref name) if name == "nonexistent"));
        assert_eq!(pen.snapshot(), before);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_mid_change_keeps_previous_tool() {
        let (mut pen, channel) = controller();
        change_tool(&mut pen, "water0").await.unwrap();
        channel.fail_matching("SP,0");

        let err = change_tool(&mut pen, "water2").await.unwrap_err();
        assert!(matches!(err, MotionError::ChannelWrite(_)));
        let snapshot = pen.snapshot();
        assert_eq!(snapshot.tool.as_deref(), Some("water0"));
        assert_eq!((snapshot.x, snapshot.y, snapshot.state), (0.0, 5650.0, 0));
    }
}
