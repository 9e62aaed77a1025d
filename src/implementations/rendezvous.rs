use std::fmt;

use parking_lot::{Condvar, Mutex};

/*
  中断可能な再利用型バリア

  std::sync::Barrier は待機中のスレッドを起こす手段がないため、
  停止指示と同時にバリアで寝ているワーカーが永久に待ち続ける。
  abort() は待機中の全員を Broken で起こし、以後の wait() も即座に Broken を返す。
  全員が揃った時点の処理（action）は最後の到着者が解放前に実行する。
*/

type Action = Box<dyn Fn() + Send + Sync>;

/// wait() の結果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// 全員が揃って解放された。leader は最後に到着したスレッドのみ true
    Released { leader: bool },
    /// abort() されたバリア
    Broken,
}

impl WaitOutcome {
    pub fn is_broken(&self) -> bool {
        matches!(self, WaitOutcome::Broken)
    }
}

#[derive(Debug)]
struct State {
    arrived: usize,
    generation: u64,
    broken: bool,
}

pub struct Rendezvous {
    parties: usize,
    state: Mutex<State>,
    released: Condvar,
    action: Option<Action>,
}

impl fmt::Debug for Rendezvous {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendezvous")
            .field("parties", &self.parties)
            .field("state", &*self.state.lock())
            .field("action", &self.action.is_some())
            .finish()
    }
}

impl Rendezvous {
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "参加者数は1以上が必要です");
        Rendezvous {
            parties,
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                broken: false,
            }),
            released: Condvar::new(),
            action: None,
        }
    }

    /// 全員到着のたびに action を実行するバリア
    pub fn with_action(parties: usize, action: impl Fn() + Send + Sync + 'static) -> Self {
        Rendezvous {
            action: Some(Box::new(action)),
            ..Self::new(parties)
        }
    }

    /// 全員が到着するまでブロックする
    pub fn wait(&self) -> WaitOutcome {
        let mut state = self.state.lock();
        if state.broken {
            return WaitOutcome::Broken;
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            // 最後の到着者が世代を進めて全員を起こす
            if let Some(action) = &self.action {
                action();
            }
            state.arrived = 0;
            state.generation = generation.wrapping_add(1);
            self.released.notify_all();
            return WaitOutcome::Released { leader: true };
        }

        while state.generation == generation && !state.broken {
            self.released.wait(&mut state);
        }

        if state.generation != generation {
            WaitOutcome::Released { leader: false }
        } else {
            WaitOutcome::Broken
        }
    }

    /// バリアを壊して待機中の全員を起こす
    pub fn abort(&self) {
        let mut state = self.state.lock();
        state.broken = true;
        state.arrived = 0;
        self.released.notify_all();
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().broken
    }

    /// 現在の世代で待機中のスレッド数
    pub fn waiting(&self) -> usize {
        self.state.lock().arrived
    }
}
