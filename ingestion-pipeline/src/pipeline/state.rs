use state_machines::state_machine;

state_machine! {
    name: LoadMachine,
    state: LoadState,
    initial: CheckCache,
    states: [CheckCache, EvaluateCompleteness, FreshLoad, ResumeLoad, Fallback, Resident],
    events {
        hit { transition: { from: CheckCache, to: EvaluateCompleteness } }
        miss { transition: { from: CheckCache, to: FreshLoad } }
        accept { transition: { from: EvaluateCompleteness, to: Resident } }
        resume { transition: { from: EvaluateCompleteness, to: ResumeLoad } }
        settle {
            transition: { from: FreshLoad, to: Resident }
            transition: { from: ResumeLoad, to: Resident }
            transition: { from: Fallback, to: Resident }
        }
        fall_back {
            transition: { from: FreshLoad, to: Fallback }
            transition: { from: ResumeLoad, to: Fallback }
        }
    }
}

pub fn check_cache() -> LoadMachine<(), CheckCache> {
    LoadMachine::new(())
}
