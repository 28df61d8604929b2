use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ferrous_host::host::{
    Channel, DispatchRuntime, HostConfig, InstanceContext, InstanceContextMode, MemoryChannel,
    Message, ServiceBehavior, ServiceHost,
};
use ferrous_host::{ContractDescription, HostOptions, Lifetime, ServiceCollection};
use std::sync::Arc;

const ADDRESS: &str = "net.tcp://localhost/echo";

trait Echo: Send + Sync {
    fn echo(&self, text: &str) -> usize;
}

struct EchoService {
    buffer: Vec<u8>,
}

impl Echo for EchoService {
    fn echo(&self, text: &str) -> usize {
        text.len() + self.buffer.len()
    }
}

fn host(mode: InstanceContextMode) -> ServiceHost {
    let lifetime = match mode {
        InstanceContextMode::Single => Lifetime::Singleton,
        _ => Lifetime::Scoped,
    };
    let mut services = ServiceCollection::new();
    services
        .register::<EchoService, _>(|_| Ok(EchoService { buffer: vec![0; 64] }))
        .lifetime(lifetime)
        .implements(ContractDescription::of::<dyn Echo>(), |s| s as Arc<dyn Echo>)
        .with_behavior(ServiceBehavior::with_mode(mode))
        .add();

    let options = HostOptions::new("bench").with_log_endpoints(false);
    let mut host = ServiceHost::new(HostConfig::new(services.build()).with_options(options)).unwrap();
    host.add_endpoint("Echo", ADDRESS, "netTcp").unwrap();
    host.open().unwrap();
    host
}

fn call(runtime: &DispatchRuntime, channel: &Arc<dyn Channel>, message: &Message) -> usize {
    let contexts = runtime.instance_context_provider.as_ref().unwrap();
    let instances = runtime.instance_provider.as_ref().unwrap();
    let context = match contexts.get_existing_instance_context(message, channel).unwrap() {
        Some(context) => context,
        None => {
            let context = InstanceContext::new();
            contexts
                .initialize_instance_context(&context, message, channel)
                .unwrap();
            context
        }
    };
    let instance = instances.get_instance(&context).unwrap();
    let echo = instance.contract::<dyn Echo>().unwrap();
    let result = echo.echo("ping");
    if contexts.is_idle(&context).unwrap() && contexts.mode() == InstanceContextMode::PerCall {
        context.close();
    }
    result
}

fn bench_warm_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("warm_dispatch");
    let message = Message::new("Echo", ADDRESS);

    for mode in [
        InstanceContextMode::Single,
        InstanceContextMode::PerSession,
        InstanceContextMode::PerCall,
    ] {
        let host = host(mode);
        let runtime = &host.endpoint(ADDRESS, "Echo").unwrap().runtime;
        let channel: Arc<dyn Channel> = MemoryChannel::open();
        call(runtime, &channel, &message);

        group.bench_with_input(BenchmarkId::from_parameter(mode), &mode, |b, _| {
            b.iter(|| black_box(call(runtime, &channel, &message)))
        });
    }
    group.finish();
}

fn bench_session_lifecycle(c: &mut Criterion) {
    let host = host(InstanceContextMode::PerSession);
    let runtime = &host.endpoint(ADDRESS, "Echo").unwrap().runtime;
    let message = Message::new("Echo", ADDRESS);

    c.bench_function("session_open_call_close", |b| {
        b.iter(|| {
            let concrete = MemoryChannel::open();
            let channel: Arc<dyn Channel> = concrete.clone();
            black_box(call(runtime, &channel, &message));
            concrete.close();
        })
    });
}

fn bench_host_open(c: &mut Criterion) {
    c.bench_function("host_open", |b| {
        b.iter(|| black_box(host(InstanceContextMode::PerSession)))
    });
}

criterion_group!(benches, bench_warm_dispatch, bench_session_lifecycle, bench_host_open);
criterion_main!(benches);
