#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod device_id;
mod network;
mod session_buffers;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2])]
mod app {
    use super::*;
    use core::cell::RefCell;
    use defmt::info;
    use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
    use embassy_futures::join::join3;
    use embassy_stm32::exti::ExtiInput;
    use embassy_stm32::gpio::{Level, Output, Pull, Speed};
    use embassy_stm32::i2c::{self, I2c};
    use embassy_stm32::mode::Blocking;
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode};
    use embassy_stm32::spi::{self, Spi};
    use embassy_stm32::time::Hertz;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
    use hal_abstractions::sensors::{gas, thermal};
    use monitor_core::{Drivers, TelemetryNode};
    use static_cell::StaticCell;

    use network::config::{node_config, STEP_PERIOD_MS};
    use network::wifi::{self, WifiPeripherals};
    use network::{EspHostedLink, MqttSession};

    type SpiPeripheral = embassy_stm32::Peri<'static, peripherals::SPI2>;
    type PinPB13 = embassy_stm32::Peri<'static, peripherals::PB13>;
    type PinPB15 = embassy_stm32::Peri<'static, peripherals::PB15>;
    type PinPB14 = embassy_stm32::Peri<'static, peripherals::PB14>;
    type PinPC6 = embassy_stm32::Peri<'static, peripherals::PC6>;
    type PinPC3 = embassy_stm32::Peri<'static, peripherals::PC3>;
    type PinPC2 = embassy_stm32::Peri<'static, peripherals::PC2>;
    type PinPB8 = embassy_stm32::Peri<'static, peripherals::PB8>;
    type HandshakeExti = embassy_stm32::Peri<'static, peripherals::EXTI2>;
    type ReadyExti = embassy_stm32::Peri<'static, peripherals::EXTI8>;
    type DmaTx = embassy_stm32::Peri<'static, peripherals::DMA1_CH4>;
    type DmaRx = embassy_stm32::Peri<'static, peripherals::DMA1_CH3>;
    type I2cPeripheral = embassy_stm32::Peri<'static, peripherals::I2C1>;
    type PinPB6 = embassy_stm32::Peri<'static, peripherals::PB6>;
    type PinPB7 = embassy_stm32::Peri<'static, peripherals::PB7>;
    type PinPC1 = embassy_stm32::Peri<'static, peripherals::PC1>;

    type SensorBus = BlockingMutex<NoopRawMutex, RefCell<I2c<'static, Blocking>>>;

    /// ESP32 co-processor wiring
    struct RadioPeripherals {
        spi: SpiPeripheral,
        sck: PinPB13,
        mosi: PinPB15,
        miso: PinPB14,
        cs: PinPC6,
        reset: PinPC3,
        handshake: PinPC2,
        handshake_exti: HandshakeExti,
        ready: PinPB8,
        ready_exti: ReadyExti,
        dma_tx: DmaTx,
        dma_rx: DmaRx,
    }

    /// Sensor bus and status LED wiring
    struct BoardPeripherals {
        i2c: I2cPeripheral,
        scl: PinPB6,
        sda: PinPB7,
        led: PinPC1,
    }

    // RNG interrupt binding for hardware random number generator
    embassy_stm32::bind_interrupts!(struct RngIrqs {
        RNG => embassy_stm32::rng::InterruptHandler<peripherals::RNG>;
    });

    #[shared]
    struct Shared {}

    #[local]
    struct Local {}

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Food monitor node starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz (PLL input)
        // 2 MHz * MUL(168) = 336 MHz (VCO)
        // VCO / DIVP(4) = 84 MHz (SYSCLK)
        // VCO / DIVQ(7) = 48 MHz (RNG clock)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: Some(embassy_stm32::rcc::PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        let p = embassy_stm32::init(config);
        info!("PLL configured: SYSCLK=84MHz, PLLQ=48MHz for RNG");

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);

        let board = BoardPeripherals {
            i2c: p.I2C1,
            scl: p.PB6,
            sda: p.PB7,
            led: p.PC1,
        };

        let radio = RadioPeripherals {
            spi: p.SPI2,
            sck: p.PB13,
            mosi: p.PB15,
            miso: p.PB14,
            cs: p.PC6,
            reset: p.PC3,
            handshake: p.PC2,
            handshake_exti: p.EXTI2,
            ready: p.PB8,
            ready_exti: p.EXTI8,
            dma_tx: p.DMA1_CH4,
            dma_rx: p.DMA1_CH3,
        };

        telemetry_task::spawn(radio, board, p.RNG).ok();

        (Shared {}, Local {})
    }

    /// Telemetry task: owns the network stack, the sensors and the node
    ///
    /// Stack is !Send and must remain within this task.
    #[task(priority = 1)]
    async fn telemetry_task(
        _cx: telemetry_task::Context,
        radio: RadioPeripherals,
        board: BoardPeripherals,
        rng_periph: embassy_stm32::Peri<'static, peripherals::RNG>,
    ) -> ! {
        use embassy_net::{Config, StackResources};
        use embassy_stm32::rng::Rng;
        use rand_core::RngCore;

        info!("Telemetry task started");

        let mut spi_config = spi::Config::default();
        spi_config.frequency = Hertz(10_000_000);

        let spi = Spi::new(
            radio.spi,
            radio.sck,
            radio.mosi,
            radio.miso,
            radio.dma_tx,
            radio.dma_rx,
            spi_config,
        );

        let wifi_periph = WifiPeripherals {
            spi,
            cs: Output::new(radio.cs, Level::High, Speed::VeryHigh),
            reset: Output::new(radio.reset, Level::High, Speed::Low),
            handshake: ExtiInput::new(radio.handshake, radio.handshake_exti, Pull::Up),
            ready: ExtiInput::new(radio.ready, radio.ready_exti, Pull::Up),
        };
        let (device, control, mut esp_runner) = wifi::init(wifi_periph).await;

        let mut rng = Rng::new(rng_periph, RngIrqs);
        let seed = rng.next_u64();

        static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
        let (stack, mut net_runner) = embassy_net::new(
            device,
            Config::dhcpv4(Default::default()),
            RESOURCES.init(StackResources::new()),
            seed,
        );
        info!("Network stack initialized with DHCP");

        // Gas sensor and thermal array share I2C1 (SCL PB6, SDA PB7)
        let mut i2c_config = i2c::Config::default();
        i2c_config.frequency = Hertz(100_000);
        let i2c = I2c::new_blocking(board.i2c, board.scl, board.sda, i2c_config);

        static SENSOR_BUS: StaticCell<SensorBus> = StaticCell::new();
        let sensor_bus: &'static SensorBus =
            SENSOR_BUS.init(BlockingMutex::new(RefCell::new(i2c)));

        // Status indicator: high while the broker session is up
        let led = Output::new(board.led, Level::Low, Speed::Low);

        let fallback_client_id = device_id::mqtt_client_id().unwrap_or("stm32f405");
        let drivers = Drivers {
            wifi: EspHostedLink::new(control, stack),
            broker: MqttSession::new(stack),
            gas: gas::MultichannelGas::new(I2cDevice::new(sensor_bus), gas::DEFAULT_ADDRESS),
            thermal: thermal::GridEye::new(I2cDevice::new(sensor_bus), thermal::DEFAULT_ADDRESS),
            indicator: led,
        };
        let mut node = TelemetryNode::new(node_config(fallback_client_id), drivers);

        let app_logic = async {
            let failures = node.start(&mut embassy_time::Delay).await;
            info!("Network up after {} failed attempts", failures);

            loop {
                let now_ms = Mono::now().duration_since_epoch().to_millis();
                node.step(now_ms).await;
                Mono::delay(STEP_PERIOD_MS.millis()).await;
            }
        };

        let (never, _, _) = join3(esp_runner.run(), net_runner.run(), app_logic).await;
        never
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
