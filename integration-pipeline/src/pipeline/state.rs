use state_machines::state_machine;

state_machine! {
    name: IntegrationMachine,
    state: IntegrationState,
    initial: Ready,
    states: [Ready, Fetched, Extracted, Mapped, Synthesized, Executed, Failed],
    events {
        fetch { transition: { from: Ready, to: Fetched } }
        extract { transition: { from: Fetched, to: Extracted } }
        map { transition: { from: Extracted, to: Mapped } }
        synthesize { transition: { from: Mapped, to: Synthesized } }
        execute { transition: { from: Synthesized, to: Executed } }
        abort {
            transition: { from: Ready, to: Failed }
            transition: { from: Fetched, to: Failed }
            transition: { from: Extracted, to: Failed }
            transition: { from: Mapped, to: Failed }
            transition: { from: Synthesized, to: Failed }
            transition: { from: Executed, to: Failed }
        }
    }
}

pub fn ready() -> IntegrationMachine<(), Ready> {
    IntegrationMachine::new(())
}
