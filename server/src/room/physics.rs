//! Phase-timer advancement and ball integration (§4.4). Lives as a sibling
//! module to keep `mod.rs` focused on construction/messaging and this file
//! focused on the numbers.

use std::time::Duration;

use protocol::{EndReason, Phase, ServerMessage, Side};
use tokio::time::Instant;

use super::{Ball, Room};

impl Room {
    /// Called once per tick-loop wakeup (§TICK_RATE). Advances the
    /// countdown/between timers and, only while `playing`, integrates the
    /// ball. A no-op in `gameover`.
    pub(super) fn tick(&mut self, now: Instant) {
        match self.phase {
            Phase::Countdown | Phase::Between => {
                self.last_tick_at = now;
                if let Some(deadline) = self.next_phase_at {
                    if now >= deadline {
                        self.next_phase_at = None;
                        self.serve_ball();
                    }
                }
            }
            Phase::Playing => self.integrate(now),
            Phase::GameOver => {}
        }
    }

    /// Places the ball at center with a fresh velocity toward `serve_toward`
    /// and enters `playing`.
    fn serve_ball(&mut self) {
        let theta = self.rng.serve_angle();
        let dir = if self.serve_toward == Side::Top { -1.0 } else { 1.0 };
        self.ball.x = protocol::W / 2.0;
        self.ball.y = protocol::H / 2.0;
        self.ball.vx = protocol::INIT_BALL_SPEED * theta.sin();
        self.ball.vy = dir * protocol::INIT_BALL_SPEED * theta.cos();
        self.ball.speed = protocol::INIT_BALL_SPEED;
        self.phase = Phase::Playing;
    }

    fn integrate(&mut self, now: Instant) {
        let dt = now
            .saturating_duration_since(self.last_tick_at)
            .as_secs_f64()
            .clamp(f64::MIN_POSITIVE, protocol::MAX_DT);
        self.last_tick_at = now;

        self.ball.x += self.ball.vx * dt;
        self.ball.y += self.ball.vy * dt;

        let r = self.params.r;
        if self.ball.x - r <= 0.0 {
            self.ball.x = r;
            self.ball.vx = self.ball.vx.abs();
        } else if self.ball.x + r >= self.params.w {
            self.ball.x = self.params.w - r;
            self.ball.vx = -self.ball.vx.abs();
        }

        let top_y = protocol::PADDING;
        let bottom_y = self.params.h - protocol::PADDING;
        let half_pw = self.params.pw / 2.0;
        let half_ph = self.params.ph / 2.0;

        if self.ball.vy < 0.0
            && (self.ball.y - r) <= (top_y + half_ph)
            && (self.ball.y + r) >= (top_y - half_ph)
            && (self.ball.x + r) >= (self.top_x * self.params.w - half_pw)
            && (self.ball.x - r) <= (self.top_x * self.params.w + half_pw)
        {
            let cx = self.top_x * self.params.w;
            self.paddle_bounce(Side::Top, cx);
            return;
        }

        if self.ball.vy > 0.0
            && (self.ball.y + r) >= (bottom_y - half_ph)
            && (self.ball.y - r) <= (bottom_y + half_ph)
            && (self.ball.x + r) >= (self.bottom_x * self.params.w - half_pw)
            && (self.ball.x - r) <= (self.bottom_x * self.params.w + half_pw)
        {
            let cx = self.bottom_x * self.params.w;
            self.paddle_bounce(Side::Bottom, cx);
            return;
        }

        if self.ball.y + r < 0.0 {
            self.on_score(now, Side::Top);
            return;
        }
        if self.ball.y - r > self.params.h {
            self.on_score(now, Side::Bottom);
        }
    }

    fn paddle_bounce(&mut self, side: Side, cx: f64) {
        let half_pw = self.params.pw / 2.0;
        let rel = ((self.ball.x - cx) / half_pw).clamp(-1.0, 1.0);
        let new_speed = (self.ball.speed * protocol::SPEED_UP)
            .clamp(protocol::MIN_BOUNCE_SPEED, protocol::MAX_BALL_SPEED);
        let theta = rel * protocol::MAX_BOUNCE_ANGLE;
        let sign: f64 = if side == Side::Top { 1.0 } else { -1.0 };
        self.ball.vx = new_speed * theta.sin();
        self.ball.vy = sign * (new_speed * theta.cos()).abs();
        self.ball.speed = new_speed;
    }

    /// §4.4 onScore: the losing side drops a heart, a `score` event fires
    /// immediately, then either the match ends or the next serve is queued.
    fn on_score(&mut self, now: Instant, loser: Side) {
        if self.phase != Phase::Playing {
            return;
        }
        self.phase = Phase::Between;
        self.slot_mut(loser).hearts = self.slot(loser).hearts.saturating_sub(1);
        let hearts = self.hearts();
        self.broadcast(move |_| ServerMessage::Score { hearts, last_miss: loser });

        if hearts.top == 0 && hearts.bottom == 0 {
            // Unreachable under the current one-heart-per-miss rule; kept as
            // a documented safety net (§9).
            self.end_game(None, EndReason::Tie);
        } else if hearts.top == 0 {
            self.end_game(Some(Side::Bottom), EndReason::Hearts);
        } else if hearts.bottom == 0 {
            self.end_game(Some(Side::Top), EndReason::Hearts);
        } else {
            self.serve_toward = loser;
            self.next_phase_at = Some(now + Duration::from_millis(1500));
            self.ball = Ball::centered();
        }
    }

    fn end_game(&mut self, winner: Option<Side>, reason: EndReason) {
        self.phase = Phase::GameOver;
        self.ball.vx = 0.0;
        self.ball.vy = 0.0;
        let hearts = self.hearts();
        self.broadcast(move |_| ServerMessage::GameOver { winner, reason, hearts });
    }
}
